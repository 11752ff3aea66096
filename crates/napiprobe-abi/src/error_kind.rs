//! The closed set of error constructors and throwers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::call::AbiCall;
use crate::env::Env;
use crate::status::AbiResult;

/// Signature shared by the four `napi_throw_*_error` entry points.
pub type ThrowFn<E> = fn(&mut E, Option<&str>, Option<&str>) -> AbiResult<()>;

/// Signature shared by the four `napi_create_*_error` entry points.
pub type CreateErrorFn<E> = fn(
    &mut E,
    Option<<E as Env>::Value>,
    Option<<E as Env>::Value>,
) -> AbiResult<<E as Env>::Value>;

/// Which error constructor a probe dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    SyntaxError,
}

impl ErrorKind {
    pub const ALL: [Self; 4] = [
        Self::Error,
        Self::TypeError,
        Self::RangeError,
        Self::SyntaxError,
    ];

    /// Parse the managed-side kind string (`error`, `type_error`, ...).
    #[must_use]
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "error" => Some(Self::Error),
            "type_error" => Some(Self::TypeError),
            "range_error" => Some(Self::RangeError),
            "syntax_error" => Some(Self::SyntaxError),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::TypeError => "type_error",
            Self::RangeError => "range_error",
            Self::SyntaxError => "syntax_error",
        }
    }

    /// Constructor name of the managed error class.
    #[must_use]
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::TypeError => "TypeError",
            Self::RangeError => "RangeError",
            Self::SyntaxError => "SyntaxError",
        }
    }

    #[must_use]
    pub fn thrower<E: Env>(self) -> ThrowFn<E> {
        match self {
            Self::Error => E::throw_error,
            Self::TypeError => E::throw_type_error,
            Self::RangeError => E::throw_range_error,
            Self::SyntaxError => E::throw_syntax_error,
        }
    }

    #[must_use]
    pub fn constructor<E: Env>(self) -> CreateErrorFn<E> {
        match self {
            Self::Error => E::create_error,
            Self::TypeError => E::create_type_error,
            Self::RangeError => E::create_range_error,
            Self::SyntaxError => E::create_syntax_error,
        }
    }

    #[must_use]
    pub const fn throw_call(self) -> AbiCall {
        match self {
            Self::Error => AbiCall::ThrowError,
            Self::TypeError => AbiCall::ThrowTypeError,
            Self::RangeError => AbiCall::ThrowRangeError,
            Self::SyntaxError => AbiCall::ThrowSyntaxError,
        }
    }

    #[must_use]
    pub const fn create_call(self) -> AbiCall {
        match self {
            Self::Error => AbiCall::CreateError,
            Self::TypeError => AbiCall::CreateTypeError,
            Self::RangeError => AbiCall::CreateRangeError,
            Self::SyntaxError => AbiCall::CreateSyntaxError,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
