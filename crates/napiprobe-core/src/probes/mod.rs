//! The probes, one module per ABI behavior under test.

pub mod array;
pub mod errors;
pub mod exception;
pub mod finalizer;
pub mod property;
pub mod type_tag;

pub use array::make_empty_array;
pub use errors::{CREATE_ERROR_REJECTIONS, create_and_throw_error, throw_error};
pub use exception::call_and_get_exception;
pub use finalizer::{FinalizerHint, create_ref_with_finalizer, was_finalize_called};
pub use property::{NAMED_KEY_CAPACITY, perform_get};
pub use type_tag::{add_tag, check_tag};
