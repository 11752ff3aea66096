//! Value classification and object type tags.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The `napi_typeof` classification of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum ValueType {
    Undefined = 0,
    Null = 1,
    Boolean = 2,
    Number = 3,
    String = 4,
    Symbol = 5,
    Object = 6,
    Function = 7,
    External = 8,
    Bigint = 9,
}

impl ValueType {
    /// Map a raw `napi_valuetype`. Returns `None` for codes outside the enum.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Option<Self> {
        Some(match raw {
            0 => Self::Undefined,
            1 => Self::Null,
            2 => Self::Boolean,
            3 => Self::Number,
            4 => Self::String,
            5 => Self::Symbol,
            6 => Self::Object,
            7 => Self::Function,
            8 => Self::External,
            9 => Self::Bigint,
            _ => return None,
        })
    }

    /// Lowercase name, as printed by probe diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Symbol => "symbol",
            Self::Object => "object",
            Self::Function => "function",
            Self::External => "external",
            Self::Bigint => "bigint",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 128-bit type tag attached to an object at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(C)]
pub struct TypeTag {
    pub lower: u64,
    pub upper: u64,
}

impl TypeTag {
    #[must_use]
    pub const fn new(lower: u64, upper: u64) -> Self {
        Self { lower, upper }
    }

    /// Widen two managed `uint32` arguments into the tag halves.
    #[must_use]
    pub const fn from_u32_halves(lower: u32, upper: u32) -> Self {
        Self {
            lower: lower as u64,
            upper: upper as u64,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}{:016x}", self.upper, self.lower)
    }
}
