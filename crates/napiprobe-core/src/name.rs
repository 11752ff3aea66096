//! Names of the exported probe entry points.

use std::fmt;

use napiprobe_abi::AbiCall;
use serde::{Deserialize, Serialize};

/// One entry point exposed to the managed environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeName {
    CreateRefWithFinalizer,
    WasFinalizeCalled,
    CallAndGetException,
    ThrowError,
    CreateAndThrowError,
    PerformGet,
    MakeEmptyArray,
    AddTag,
    CheckTag,
}

impl ProbeName {
    pub const ALL: [Self; 9] = [
        Self::CreateRefWithFinalizer,
        Self::WasFinalizeCalled,
        Self::CallAndGetException,
        Self::ThrowError,
        Self::CreateAndThrowError,
        Self::PerformGet,
        Self::MakeEmptyArray,
        Self::AddTag,
        Self::CheckTag,
    ];

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|probe| probe.as_str() == name)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateRefWithFinalizer => "create_ref_with_finalizer",
            Self::WasFinalizeCalled => "was_finalize_called",
            Self::CallAndGetException => "call_and_get_exception",
            Self::ThrowError => "throw_error",
            Self::CreateAndThrowError => "create_and_throw_error",
            Self::PerformGet => "perform_get",
            Self::MakeEmptyArray => "make_empty_array",
            Self::AddTag => "add_tag",
            Self::CheckTag => "check_tag",
        }
    }

    /// Number of managed arguments the entry point reads.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::WasFinalizeCalled => 0,
            Self::CreateRefWithFinalizer | Self::CallAndGetException | Self::MakeEmptyArray => 1,
            Self::PerformGet => 2,
            Self::ThrowError | Self::CreateAndThrowError | Self::AddTag | Self::CheckTag => 3,
        }
    }

    /// Managed signature, for listings.
    #[must_use]
    pub const fn signature(self) -> &'static str {
        match self {
            Self::CreateRefWithFinalizer => "(reentrant: boolean) -> undefined",
            Self::WasFinalizeCalled => "() -> boolean",
            Self::CallAndGetException => "(fn: function) -> any",
            Self::ThrowError => {
                "(code: string|undefined, msg: string|undefined, kind: string) -> undefined | throws"
            }
            Self::CreateAndThrowError => "(code: any, msg: any, kind: string) -> undefined | throws",
            Self::PerformGet => "(object: object, key: any) -> any",
            Self::MakeEmptyArray => "(size: uint32) -> array",
            Self::AddTag => "(object: object, lower: uint32, upper: uint32) -> undefined",
            Self::CheckTag => "(object: object, lower: uint32, upper: uint32) -> boolean",
        }
    }

    /// ABI symbols the probe consumes, in call order. Error-kind dispatch
    /// lists all four constructors/throwers.
    #[must_use]
    pub const fn abi_calls(self) -> &'static [AbiCall] {
        match self {
            Self::CreateRefWithFinalizer => &[
                AbiCall::GetValueBool,
                AbiCall::CreateObject,
                AbiCall::Wrap,
                AbiCall::OpenHandleScope,
                AbiCall::CloseHandleScope,
            ],
            Self::WasFinalizeCalled => &[AbiCall::GetBoolean],
            Self::CallAndGetException => &[
                AbiCall::GetUndefined,
                AbiCall::CallFunction,
                AbiCall::IsExceptionPending,
                AbiCall::GetAndClearLastException,
                AbiCall::Typeof,
            ],
            Self::ThrowError => &[
                AbiCall::Typeof,
                AbiCall::GetValueStringUtf8,
                AbiCall::ThrowError,
                AbiCall::ThrowTypeError,
                AbiCall::ThrowRangeError,
                AbiCall::ThrowSyntaxError,
            ],
            Self::CreateAndThrowError => &[
                AbiCall::Typeof,
                AbiCall::GetValueStringUtf8,
                AbiCall::CreateError,
                AbiCall::CreateTypeError,
                AbiCall::CreateRangeError,
                AbiCall::CreateSyntaxError,
                AbiCall::Throw,
            ],
            Self::PerformGet => &[
                AbiCall::Typeof,
                AbiCall::GetValueStringUtf8,
                AbiCall::GetNamedProperty,
                AbiCall::GetProperty,
            ],
            Self::MakeEmptyArray => &[AbiCall::GetValueUint32, AbiCall::CreateArrayWithLength],
            Self::AddTag => &[AbiCall::GetValueUint32, AbiCall::TypeTagObject],
            Self::CheckTag => &[
                AbiCall::GetValueUint32,
                AbiCall::CheckObjectTypeTag,
                AbiCall::GetBoolean,
            ],
        }
    }
}

impl fmt::Display for ProbeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
