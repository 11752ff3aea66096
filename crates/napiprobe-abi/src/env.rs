//! The environment seam every probe is generic over.

use std::fmt;

use thiserror::Error;

use crate::call::AbiCall;
use crate::status::{AbiResult, Status};
use crate::value::{TypeTag, ValueType};

/// Failure raised from inside a finalizer callback.
///
/// Environments treat this as a fatal contract violation: the ABI refused an
/// operation it must permit during finalization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{call} returned {status} inside finalizer")]
pub struct FinalizeError {
    pub call: AbiCall,
    pub status: Status,
}

/// Native finalizer moved into [`Env::wrap`].
///
/// The environment invokes it at most once, when the wrapped object is
/// reclaimed. Ownership of everything it captures moves with it.
pub type Finalizer<E> = Box<dyn FnOnce(&mut E) -> Result<(), FinalizeError>>;

/// Operations consumed from a Node-API implementation.
///
/// Each method corresponds to one C symbol (see [`AbiCall`]). Methods return
/// the exact status the ABI produced so probes can assert on it; nothing here
/// retries or normalizes failures.
pub trait Env: Sized + 'static {
    /// Handle to a managed value, valid for the enclosing handle scope.
    type Value: Copy + fmt::Debug;
    /// Token for an open handle scope.
    type Scope;
    /// Reference returned by `napi_wrap`.
    type Reference;

    fn get_undefined(&mut self) -> AbiResult<Self::Value>;
    fn get_boolean(&mut self, value: bool) -> AbiResult<Self::Value>;
    fn type_of(&mut self, value: Self::Value) -> AbiResult<ValueType>;

    fn get_value_bool(&mut self, value: Self::Value) -> AbiResult<bool>;
    fn get_value_uint32(&mut self, value: Self::Value) -> AbiResult<u32>;
    /// Copy at most `capacity - 1` bytes of UTF-8 out of a string value, as
    /// `napi_get_value_string_utf8` does with a `capacity`-sized buffer.
    /// `usize::MAX` reads the whole string.
    fn get_value_string_utf8(&mut self, value: Self::Value, capacity: usize)
    -> AbiResult<String>;

    fn create_object(&mut self) -> AbiResult<Self::Value>;
    fn create_array_with_length(&mut self, length: u32) -> AbiResult<Self::Value>;

    /// Attach `finalizer` to `object`. The returned reference is weak.
    fn wrap(
        &mut self,
        object: Self::Value,
        finalizer: Finalizer<Self>,
    ) -> AbiResult<Self::Reference>;

    fn open_handle_scope(&mut self) -> AbiResult<Self::Scope>;
    fn close_handle_scope(&mut self, scope: Self::Scope) -> AbiResult<()>;

    fn call_function(
        &mut self,
        recv: Self::Value,
        func: Self::Value,
        args: &[Self::Value],
    ) -> AbiResult<Self::Value>;
    fn is_exception_pending(&mut self) -> AbiResult<bool>;
    fn get_and_clear_last_exception(&mut self) -> AbiResult<Self::Value>;
    fn throw(&mut self, error: Self::Value) -> AbiResult<()>;

    fn throw_error(&mut self, code: Option<&str>, msg: Option<&str>) -> AbiResult<()>;
    fn throw_type_error(&mut self, code: Option<&str>, msg: Option<&str>) -> AbiResult<()>;
    fn throw_range_error(&mut self, code: Option<&str>, msg: Option<&str>) -> AbiResult<()>;
    fn throw_syntax_error(&mut self, code: Option<&str>, msg: Option<&str>) -> AbiResult<()>;

    fn create_error(
        &mut self,
        code: Option<Self::Value>,
        msg: Option<Self::Value>,
    ) -> AbiResult<Self::Value>;
    fn create_type_error(
        &mut self,
        code: Option<Self::Value>,
        msg: Option<Self::Value>,
    ) -> AbiResult<Self::Value>;
    fn create_range_error(
        &mut self,
        code: Option<Self::Value>,
        msg: Option<Self::Value>,
    ) -> AbiResult<Self::Value>;
    fn create_syntax_error(
        &mut self,
        code: Option<Self::Value>,
        msg: Option<Self::Value>,
    ) -> AbiResult<Self::Value>;

    fn get_named_property(&mut self, object: Self::Value, name: &str) -> AbiResult<Self::Value>;
    fn get_property(&mut self, object: Self::Value, key: Self::Value) -> AbiResult<Self::Value>;

    fn type_tag_object(&mut self, object: Self::Value, tag: &TypeTag) -> AbiResult<()>;
    fn check_object_type_tag(&mut self, object: Self::Value, tag: &TypeTag) -> AbiResult<bool>;
}
