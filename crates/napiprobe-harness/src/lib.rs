//! Conformance testing harness for the napiprobe probes.
//!
//! This crate provides:
//! - Fixtures: JSON case files binding managed values and scripting probe calls
//! - Runner: execute fixtures against the model environment per profile
//! - Capture: record observed outcomes and compare the `node` and `bun` profiles
//! - Traceability: map probes to contract clauses and consumed ABI symbols
//! - Report generation: human-readable + machine-readable conformance reports
//! - Structured logging: JSONL run logs plus a SHA-256 artifact index

#![forbid(unsafe_code)]

pub mod capture;
pub mod diff;
pub mod error;
pub mod fixtures;
pub mod report;
pub mod runner;
pub mod structured_log;
pub mod traceability;
pub mod values;
pub mod verify;

pub use error::{FixtureError, HarnessError};
pub use fixtures::{FixtureCase, FixtureSet, ProfileSelection};
pub use report::ConformanceReport;
pub use runner::TestRunner;
pub use verify::{VerificationResult, VerificationSummary};
