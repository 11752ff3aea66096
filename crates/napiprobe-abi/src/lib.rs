//! Node-API contract consumed by the napiprobe probes.
//!
//! This crate does not implement the ABI. It names the operations, status
//! codes and value shapes the probes rely on, so the same probes can run
//! against a real engine (through `napiprobe-addon`) or the in-memory
//! reference environment (`napiprobe-model`).
//!
//! - [`Status`]: Node-API status codes; ABI calls return [`AbiResult`].
//! - [`ValueType`]: the `napi_typeof` classification.
//! - [`TypeTag`]: the 128-bit object provenance tag.
//! - [`ErrorKind`]: the closed set of error constructors/throwers.
//! - [`AbiCall`]: one identifier per consumed symbol.
//! - [`Env`]: the environment seam every probe is generic over.

#![forbid(unsafe_code)]

pub mod call;
pub mod env;
pub mod error_kind;
pub mod status;
pub mod value;

pub use call::AbiCall;
pub use env::{Env, FinalizeError, Finalizer};
pub use error_kind::{CreateErrorFn, ErrorKind, ThrowFn};
pub use status::{AbiResult, Status};
pub use value::{TypeTag, ValueType};
