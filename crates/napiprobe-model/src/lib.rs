//! In-memory Node-API environment.
//!
//! [`ModelEnv`] implements [`napiprobe_abi::Env`] over a small managed heap
//! with handle scopes, a pending-exception slot, a mark-sweep collector that
//! runs wrap finalizers, and per-call fault injection. Two validation
//! profiles ([`ModelProfile`]) reproduce the argument-checking orders of the
//! engines the probes are run against.

mod abi_impl;
pub mod config;
pub mod describe;
pub mod env;
pub mod heap;

pub use config::{ModelConfig, ModelProfile, configured_profile};
pub use describe::format_number;
pub use env::{GcStats, ModelEnv, ModelRef, ModelScope};
pub use heap::{Callable, Handle};
