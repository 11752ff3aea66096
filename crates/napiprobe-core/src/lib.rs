//! Node-API edge-case probes.
//!
//! Each probe issues a fixed sequence of ABI calls through [`napiprobe_abi::Env`]
//! and checks the status every step must produce. A status outside the
//! contract aborts the probe with a [`ProbeError`]; a failure the contract
//! requires is checked and reported as success.
//!
//! ```text
//! managed caller -> exports::invoke -> probe -> Env (real engine or model)
//! ```
//!
//! Probes share no global state. The finalize latch and diagnostics live in a
//! [`ProbeContext`] owned by whoever drives the probes (the addon keeps one per
//! environment, the harness one per fixture case).

#![deny(unsafe_code)]

pub mod completion;
pub mod context;
pub mod error;
pub mod exports;
pub mod latch;
pub mod name;
pub mod probes;

pub use completion::Completion;
pub use context::{Diagnostic, DiagnosticEvent, ProbeContext};
pub use error::{ProbeError, ProbeResult};
pub use exports::{dispatch, invoke, raise};
pub use latch::FinalizeLatch;
pub use name::ProbeName;
