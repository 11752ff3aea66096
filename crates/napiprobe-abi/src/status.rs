//! Node-API status codes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of a single ABI call. `Err` never carries [`Status::Ok`].
pub type AbiResult<T> = Result<T, Status>;

/// Status returned by every Node-API call.
///
/// Discriminants match the C `napi_status` enum so raw codes round-trip
/// through [`Status::from_raw`] and [`Status::as_raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    InvalidArg = 1,
    ObjectExpected = 2,
    StringExpected = 3,
    NameExpected = 4,
    FunctionExpected = 5,
    NumberExpected = 6,
    BooleanExpected = 7,
    ArrayExpected = 8,
    GenericFailure = 9,
    PendingException = 10,
    Cancelled = 11,
    EscapeCalledTwice = 12,
    HandleScopeMismatch = 13,
    CallbackScopeMismatch = 14,
    QueueFull = 15,
    Closing = 16,
    BigintExpected = 17,
    DateExpected = 18,
    ArraybufferExpected = 19,
    DetachableArraybufferExpected = 20,
    WouldDeadlock = 21,
    NoExternalBuffersAllowed = 22,
    CannotRunJs = 23,
}

impl Status {
    const ALL: [Self; 24] = [
        Self::Ok,
        Self::InvalidArg,
        Self::ObjectExpected,
        Self::StringExpected,
        Self::NameExpected,
        Self::FunctionExpected,
        Self::NumberExpected,
        Self::BooleanExpected,
        Self::ArrayExpected,
        Self::GenericFailure,
        Self::PendingException,
        Self::Cancelled,
        Self::EscapeCalledTwice,
        Self::HandleScopeMismatch,
        Self::CallbackScopeMismatch,
        Self::QueueFull,
        Self::Closing,
        Self::BigintExpected,
        Self::DateExpected,
        Self::ArraybufferExpected,
        Self::DetachableArraybufferExpected,
        Self::WouldDeadlock,
        Self::NoExternalBuffersAllowed,
        Self::CannotRunJs,
    ];

    /// Map a raw `napi_status` code. Unknown codes collapse to `GenericFailure`.
    #[must_use]
    pub fn from_raw(raw: i32) -> Self {
        usize::try_from(raw)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .unwrap_or(Self::GenericFailure)
    }

    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    /// Convert a raw call status into an [`AbiResult`] carrying `value` on success.
    pub fn into_result<T>(self, value: T) -> AbiResult<T> {
        match self {
            Self::Ok => Ok(value),
            other => Err(other),
        }
    }

    /// The C enumerator name, e.g. `napi_pending_exception`.
    #[must_use]
    pub const fn c_name(self) -> &'static str {
        match self {
            Self::Ok => "napi_ok",
            Self::InvalidArg => "napi_invalid_arg",
            Self::ObjectExpected => "napi_object_expected",
            Self::StringExpected => "napi_string_expected",
            Self::NameExpected => "napi_name_expected",
            Self::FunctionExpected => "napi_function_expected",
            Self::NumberExpected => "napi_number_expected",
            Self::BooleanExpected => "napi_boolean_expected",
            Self::ArrayExpected => "napi_array_expected",
            Self::GenericFailure => "napi_generic_failure",
            Self::PendingException => "napi_pending_exception",
            Self::Cancelled => "napi_cancelled",
            Self::EscapeCalledTwice => "napi_escape_called_twice",
            Self::HandleScopeMismatch => "napi_handle_scope_mismatch",
            Self::CallbackScopeMismatch => "napi_callback_scope_mismatch",
            Self::QueueFull => "napi_queue_full",
            Self::Closing => "napi_closing",
            Self::BigintExpected => "napi_bigint_expected",
            Self::DateExpected => "napi_date_expected",
            Self::ArraybufferExpected => "napi_arraybuffer_expected",
            Self::DetachableArraybufferExpected => "napi_detachable_arraybuffer_expected",
            Self::WouldDeadlock => "napi_would_deadlock",
            Self::NoExternalBuffersAllowed => "napi_no_external_buffers_allowed",
            Self::CannotRunJs => "napi_cannot_run_js",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_name())
    }
}
