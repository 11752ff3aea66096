//! Helper macros for Node-API calls.

/// Call a `sys` function and convert its `napi_status` into an
/// [`napiprobe_abi::AbiResult`].
///
/// ```ignore
/// let mut result = ptr::null_mut();
/// napi_call!(napi_create_object(self.raw, &mut result))?;
/// ```
macro_rules! napi_call {
    ($name:ident ( $($arg:expr),* $(,)? )) => {
        ::napiprobe_abi::Status::from_raw(
            // SAFETY: every argument is a live handle of the current
            // environment or a pointer to a local out-slot.
            unsafe { $crate::sys::$name($($arg),*) },
        )
        .into_result(())
    };
}

pub(crate) use napi_call;
