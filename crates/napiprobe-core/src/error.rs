//! Probe-fatal failures.

use napiprobe_abi::{AbiCall, AbiResult, Status};
use thiserror::Error;

use crate::name::ProbeName;

pub type ProbeResult<T> = Result<T, ProbeError>;

/// The ABI under test broke a contract a probe relies on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// A call that must succeed did not.
    #[error("{call} failed with {status}")]
    Call { call: AbiCall, status: Status },
    /// A call returned a status other than the one the probe requires.
    #[error("{probe}: {call} returned {actual}, expected {expected}")]
    UnexpectedStatus {
        probe: ProbeName,
        call: AbiCall,
        expected: &'static str,
        actual: Status,
    },
    #[error("{probe}: assertion failed: {message}")]
    Assertion {
        probe: ProbeName,
        message: &'static str,
    },
    #[error("unknown error kind '{0}', expected error|type_error|range_error|syntax_error")]
    UnknownErrorKind(String),
}

impl ProbeError {
    pub(crate) fn unexpected<T>(
        probe: ProbeName,
        call: AbiCall,
        expected: &'static str,
        result: &AbiResult<T>,
    ) -> Self {
        Self::UnexpectedStatus {
            probe,
            call,
            expected,
            actual: status_of(result),
        }
    }

    /// The ABI call that broke its contract, if one did.
    #[must_use]
    pub fn call(&self) -> Option<AbiCall> {
        match self {
            Self::Call { call, .. } | Self::UnexpectedStatus { call, .. } => Some(*call),
            Self::Assertion { .. } | Self::UnknownErrorKind(_) => None,
        }
    }

    /// The status that call produced.
    #[must_use]
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Call { status, .. } => Some(*status),
            Self::UnexpectedStatus { actual, .. } => Some(*actual),
            Self::Assertion { .. } | Self::UnknownErrorKind(_) => None,
        }
    }
}

/// The status a call produced, `Ok` included.
#[must_use]
pub fn status_of<T>(result: &AbiResult<T>) -> Status {
    match result {
        Ok(_) => Status::Ok,
        Err(status) => *status,
    }
}

/// Attach the failing call to a required ABI result.
pub(crate) trait Required<T> {
    fn required(self, call: AbiCall) -> ProbeResult<T>;
}

impl<T> Required<T> for AbiResult<T> {
    fn required(self, call: AbiCall) -> ProbeResult<T> {
        self.map_err(|status| ProbeError::Call { call, status })
    }
}

pub(crate) fn ensure(condition: bool, probe: ProbeName, message: &'static str) -> ProbeResult<()> {
    if condition {
        Ok(())
    } else {
        Err(ProbeError::Assertion { probe, message })
    }
}
