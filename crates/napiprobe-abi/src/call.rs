//! Identifiers for the consumed ABI operations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One variant per Node-API symbol the probes call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbiCall {
    GetUndefined,
    GetBoolean,
    Typeof,
    GetValueBool,
    GetValueUint32,
    GetValueStringUtf8,
    CreateObject,
    CreateArrayWithLength,
    Wrap,
    OpenHandleScope,
    CloseHandleScope,
    CallFunction,
    IsExceptionPending,
    GetAndClearLastException,
    Throw,
    ThrowError,
    ThrowTypeError,
    ThrowRangeError,
    ThrowSyntaxError,
    CreateError,
    CreateTypeError,
    CreateRangeError,
    CreateSyntaxError,
    GetNamedProperty,
    GetProperty,
    TypeTagObject,
    CheckObjectTypeTag,
}

impl AbiCall {
    /// The exported C symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::GetUndefined => "napi_get_undefined",
            Self::GetBoolean => "napi_get_boolean",
            Self::Typeof => "napi_typeof",
            Self::GetValueBool => "napi_get_value_bool",
            Self::GetValueUint32 => "napi_get_value_uint32",
            Self::GetValueStringUtf8 => "napi_get_value_string_utf8",
            Self::CreateObject => "napi_create_object",
            Self::CreateArrayWithLength => "napi_create_array_with_length",
            Self::Wrap => "napi_wrap",
            Self::OpenHandleScope => "napi_open_handle_scope",
            Self::CloseHandleScope => "napi_close_handle_scope",
            Self::CallFunction => "napi_call_function",
            Self::IsExceptionPending => "napi_is_exception_pending",
            Self::GetAndClearLastException => "napi_get_and_clear_last_exception",
            Self::Throw => "napi_throw",
            Self::ThrowError => "napi_throw_error",
            Self::ThrowTypeError => "napi_throw_type_error",
            Self::ThrowRangeError => "napi_throw_range_error",
            Self::ThrowSyntaxError => "node_api_throw_syntax_error",
            Self::CreateError => "napi_create_error",
            Self::CreateTypeError => "napi_create_type_error",
            Self::CreateRangeError => "napi_create_range_error",
            Self::CreateSyntaxError => "node_api_create_syntax_error",
            Self::GetNamedProperty => "napi_get_named_property",
            Self::GetProperty => "napi_get_property",
            Self::TypeTagObject => "napi_type_tag_object",
            Self::CheckObjectTypeTag => "napi_check_object_type_tag",
        }
    }
}

impl fmt::Display for AbiCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
