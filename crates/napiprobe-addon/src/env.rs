//! `Env` over a live `napi_env`.

use std::ffi::{CString, c_void};
use std::ptr;

use napiprobe_abi::{AbiResult, Env, Finalizer, Status, TypeTag, ValueType};

use crate::macros::napi_call;
use crate::sys::{self, napi_env, napi_handle_scope, napi_value};

/// Borrowed view of the environment passed to a callback.
///
/// Valid only for the duration of the callback that produced it.
#[derive(Debug)]
pub struct NapiEnv {
    raw: napi_env,
}

impl NapiEnv {
    /// # Safety
    /// `raw` must be the environment of the currently executing Node-API
    /// callback or finalizer.
    pub unsafe fn from_raw(raw: napi_env) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> napi_env {
        self.raw
    }
}

/// Managed strings may contain NUL; C sees the prefix before it.
fn c_string(value: &str) -> CString {
    let end = value.find('\0').unwrap_or(value.len());
    CString::new(&value[..end]).unwrap_or_default()
}

fn c_ptr(value: Option<&CString>) -> *const std::ffi::c_char {
    value.map_or(ptr::null(), |value| value.as_ptr())
}

fn value_or_null(value: Option<napi_value>) -> napi_value {
    value.unwrap_or(ptr::null_mut())
}

/// Abort the process through `napi_fatal_error`.
pub(crate) fn fatal(location: &str, message: &str) -> ! {
    // SAFETY: both buffers are valid for the given lengths.
    unsafe {
        sys::napi_fatal_error(
            location.as_ptr().cast(),
            location.len(),
            message.as_ptr().cast(),
            message.len(),
        )
    }
}

unsafe extern "C" fn finalize_wrapped(raw: napi_env, _data: *mut c_void, hint: *mut c_void) {
    // SAFETY: `hint` is the box leaked by `NapiEnv::wrap`; Node-API invokes
    // this callback once per wrap.
    let finalizer: Finalizer<NapiEnv> =
        *unsafe { Box::from_raw(hint.cast::<Finalizer<NapiEnv>>()) };
    // SAFETY: called by Node-API with the finalizing environment.
    let mut env = unsafe { NapiEnv::from_raw(raw) };
    if let Err(err) = finalizer(&mut env) {
        fatal("napiprobe::create_ref_with_finalizer", &err.to_string());
    }
}

impl NapiEnv {
    fn throw_with(
        &mut self,
        throw: unsafe extern "C" fn(
            napi_env,
            *const std::ffi::c_char,
            *const std::ffi::c_char,
        ) -> sys::napi_status,
        code: Option<&str>,
        msg: Option<&str>,
    ) -> AbiResult<()> {
        let code = code.map(c_string);
        let msg = msg.map(c_string);
        // SAFETY: both pointers are null or point at live C strings.
        let status = unsafe { throw(self.raw, c_ptr(code.as_ref()), c_ptr(msg.as_ref())) };
        Status::from_raw(status).into_result(())
    }

    fn create_with(
        &mut self,
        create: unsafe extern "C" fn(
            napi_env,
            napi_value,
            napi_value,
            *mut napi_value,
        ) -> sys::napi_status,
        code: Option<napi_value>,
        msg: Option<napi_value>,
    ) -> AbiResult<napi_value> {
        let mut result = ptr::null_mut();
        // SAFETY: handles are null or live in the current scope.
        let status =
            unsafe { create(self.raw, value_or_null(code), value_or_null(msg), &mut result) };
        Status::from_raw(status).into_result(result)
    }
}

impl Env for NapiEnv {
    type Value = napi_value;
    type Scope = napi_handle_scope;
    type Reference = ();

    fn get_undefined(&mut self) -> AbiResult<napi_value> {
        let mut result = ptr::null_mut();
        napi_call!(napi_get_undefined(self.raw, &mut result))?;
        Ok(result)
    }

    fn get_boolean(&mut self, value: bool) -> AbiResult<napi_value> {
        let mut result = ptr::null_mut();
        napi_call!(napi_get_boolean(self.raw, value, &mut result))?;
        Ok(result)
    }

    fn type_of(&mut self, value: napi_value) -> AbiResult<ValueType> {
        let mut raw_type: sys::napi_valuetype = 0;
        napi_call!(napi_typeof(self.raw, value, &mut raw_type))?;
        ValueType::from_raw(raw_type).ok_or(Status::GenericFailure)
    }

    fn get_value_bool(&mut self, value: napi_value) -> AbiResult<bool> {
        let mut result = false;
        napi_call!(napi_get_value_bool(self.raw, value, &mut result))?;
        Ok(result)
    }

    fn get_value_uint32(&mut self, value: napi_value) -> AbiResult<u32> {
        let mut result: u32 = 0;
        napi_call!(napi_get_value_uint32(self.raw, value, &mut result))?;
        Ok(result)
    }

    fn get_value_string_utf8(&mut self, value: napi_value, capacity: usize) -> AbiResult<String> {
        let capacity = if capacity == usize::MAX {
            let mut length: usize = 0;
            napi_call!(napi_get_value_string_utf8(
                self.raw,
                value,
                ptr::null_mut(),
                0,
                &mut length
            ))?;
            length.saturating_add(1)
        } else {
            capacity
        };
        let mut buf = vec![0u8; capacity.max(1)];
        let mut written: usize = 0;
        napi_call!(napi_get_value_string_utf8(
            self.raw,
            value,
            buf.as_mut_ptr().cast(),
            capacity,
            &mut written
        ))?;
        buf.truncate(written);
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn create_object(&mut self) -> AbiResult<napi_value> {
        let mut result = ptr::null_mut();
        napi_call!(napi_create_object(self.raw, &mut result))?;
        Ok(result)
    }

    fn create_array_with_length(&mut self, length: u32) -> AbiResult<napi_value> {
        let mut result = ptr::null_mut();
        napi_call!(napi_create_array_with_length(
            self.raw,
            length as usize,
            &mut result
        ))?;
        Ok(result)
    }

    fn wrap(&mut self, object: napi_value, finalizer: Finalizer<Self>) -> AbiResult<()> {
        let hint = Box::into_raw(Box::new(finalizer));
        let wrapped = napi_call!(napi_wrap(
            self.raw,
            object,
            ptr::null_mut(),
            Some(finalize_wrapped),
            hint.cast(),
            ptr::null_mut()
        ));
        if wrapped.is_err() {
            // SAFETY: the wrap was refused, so the hint was never handed over.
            drop(unsafe { Box::from_raw(hint) });
        }
        wrapped
    }

    fn open_handle_scope(&mut self) -> AbiResult<napi_handle_scope> {
        let mut scope = ptr::null_mut();
        napi_call!(napi_open_handle_scope(self.raw, &mut scope))?;
        Ok(scope)
    }

    fn close_handle_scope(&mut self, scope: napi_handle_scope) -> AbiResult<()> {
        napi_call!(napi_close_handle_scope(self.raw, scope))
    }

    fn call_function(
        &mut self,
        recv: napi_value,
        func: napi_value,
        args: &[napi_value],
    ) -> AbiResult<napi_value> {
        let mut result = ptr::null_mut();
        napi_call!(napi_call_function(
            self.raw,
            recv,
            func,
            args.len(),
            args.as_ptr(),
            &mut result
        ))?;
        Ok(result)
    }

    fn is_exception_pending(&mut self) -> AbiResult<bool> {
        let mut result = false;
        napi_call!(napi_is_exception_pending(self.raw, &mut result))?;
        Ok(result)
    }

    fn get_and_clear_last_exception(&mut self) -> AbiResult<napi_value> {
        let mut result = ptr::null_mut();
        napi_call!(napi_get_and_clear_last_exception(self.raw, &mut result))?;
        Ok(result)
    }

    fn throw(&mut self, error: napi_value) -> AbiResult<()> {
        napi_call!(napi_throw(self.raw, error))
    }

    fn throw_error(&mut self, code: Option<&str>, msg: Option<&str>) -> AbiResult<()> {
        self.throw_with(sys::napi_throw_error, code, msg)
    }

    fn throw_type_error(&mut self, code: Option<&str>, msg: Option<&str>) -> AbiResult<()> {
        self.throw_with(sys::napi_throw_type_error, code, msg)
    }

    fn throw_range_error(&mut self, code: Option<&str>, msg: Option<&str>) -> AbiResult<()> {
        self.throw_with(sys::napi_throw_range_error, code, msg)
    }

    fn throw_syntax_error(&mut self, code: Option<&str>, msg: Option<&str>) -> AbiResult<()> {
        self.throw_with(sys::node_api_throw_syntax_error, code, msg)
    }

    fn create_error(
        &mut self,
        code: Option<napi_value>,
        msg: Option<napi_value>,
    ) -> AbiResult<napi_value> {
        self.create_with(sys::napi_create_error, code, msg)
    }

    fn create_type_error(
        &mut self,
        code: Option<napi_value>,
        msg: Option<napi_value>,
    ) -> AbiResult<napi_value> {
        self.create_with(sys::napi_create_type_error, code, msg)
    }

    fn create_range_error(
        &mut self,
        code: Option<napi_value>,
        msg: Option<napi_value>,
    ) -> AbiResult<napi_value> {
        self.create_with(sys::napi_create_range_error, code, msg)
    }

    fn create_syntax_error(
        &mut self,
        code: Option<napi_value>,
        msg: Option<napi_value>,
    ) -> AbiResult<napi_value> {
        self.create_with(sys::node_api_create_syntax_error, code, msg)
    }

    fn get_named_property(&mut self, object: napi_value, name: &str) -> AbiResult<napi_value> {
        let name = c_string(name);
        let mut result = ptr::null_mut();
        napi_call!(napi_get_named_property(
            self.raw,
            object,
            name.as_ptr(),
            &mut result
        ))?;
        Ok(result)
    }

    fn get_property(&mut self, object: napi_value, key: napi_value) -> AbiResult<napi_value> {
        let mut result = ptr::null_mut();
        napi_call!(napi_get_property(self.raw, object, key, &mut result))?;
        Ok(result)
    }

    fn type_tag_object(&mut self, object: napi_value, tag: &TypeTag) -> AbiResult<()> {
        napi_call!(napi_type_tag_object(self.raw, object, tag))
    }

    fn check_object_type_tag(&mut self, object: napi_value, tag: &TypeTag) -> AbiResult<bool> {
        let mut result = false;
        napi_call!(napi_check_object_type_tag(
            self.raw,
            object,
            tag,
            &mut result
        ))?;
        Ok(result)
    }
}
