// Every extern "C" entry receives raw handles from the Node-API host.
#![allow(clippy::missing_safety_doc)]
//! # napiprobe-addon
//!
//! Node-API addon exposing the probes to JavaScript.
//!
//! ```text
//! JS caller -> probe_entry (this crate) -> napiprobe_core::invoke -> NapiEnv -> host Node-API
//! ```
//!
//! Each environment that loads the addon gets its own
//! [`napiprobe_core::ProbeContext`] stored as instance data, so the finalize
//! latch is per environment (per worker thread) rather than process-wide.
//! Every call runs on its own context sharing that latch, and its diagnostics
//! are merged back and printed to stdout once the call returns.

mod macros;

pub mod env;
pub mod sys;

use std::ffi::{CString, c_void};
use std::ptr;

use napiprobe_abi::{AbiResult, Env, Status};
use napiprobe_core::{Completion, ProbeContext, ProbeName, invoke};
use parking_lot::Mutex;

use crate::env::{NapiEnv, fatal};
use crate::macros::napi_call;
use crate::sys::{napi_callback_info, napi_env, napi_value};

/// Largest arity among the exported probes.
const MAX_ARGS: usize = 3;

type SharedContext = Mutex<ProbeContext>;

unsafe extern "C" fn drop_context(_raw: napi_env, data: *mut c_void, _hint: *mut c_void) {
    // SAFETY: `data` is the box installed by `install_context`.
    drop(unsafe { Box::from_raw(data.cast::<SharedContext>()) });
}

fn install_context(raw: napi_env) -> AbiResult<()> {
    let data = Box::into_raw(Box::new(Mutex::new(ProbeContext::new())));
    let installed = napi_call!(napi_set_instance_data(
        raw,
        data.cast(),
        Some(drop_context),
        ptr::null_mut()
    ));
    if installed.is_err() {
        // SAFETY: ownership was not transferred to the environment.
        drop(unsafe { Box::from_raw(data) });
    }
    installed
}

/// The context installed for `raw`.
///
/// # Safety
/// `raw` must be the environment of the executing callback. The returned
/// reference must not outlive that callback.
unsafe fn context<'a>(raw: napi_env) -> AbiResult<&'a SharedContext> {
    let mut data: *mut c_void = ptr::null_mut();
    napi_call!(napi_get_instance_data(raw, &mut data))?;
    // SAFETY: instance data is only ever set by `install_context` and lives
    // until the environment tears down.
    unsafe { data.cast::<SharedContext>().as_ref() }.ok_or(Status::GenericFailure)
}

unsafe extern "C" fn probe_entry(raw: napi_env, info: napi_callback_info) -> napi_value {
    // SAFETY: Node-API passes the calling environment.
    let mut env = unsafe { NapiEnv::from_raw(raw) };

    let mut argv: [napi_value; MAX_ARGS] = [ptr::null_mut(); MAX_ARGS];
    let mut argc = MAX_ARGS;
    let mut data: *mut c_void = ptr::null_mut();
    let decoded = napi_call!(napi_get_cb_info(
        raw,
        info,
        &mut argc,
        argv.as_mut_ptr(),
        ptr::null_mut(),
        &mut data
    ));
    let Some(probe) = ProbeName::ALL.get(data.addr()).copied() else {
        fatal("napiprobe::probe_entry", "callback data is not a probe index");
    };
    if let Err(status) = decoded {
        let _ = env.throw_error(None, Some(&format!("{probe}: napi_get_cb_info failed with {status}")));
        return ptr::null_mut();
    }

    // SAFETY: `raw` is the current environment; the borrow ends with this call.
    let shared = match unsafe { context(raw) } {
        Ok(shared) => shared,
        Err(status) => {
            let _ = env.throw_error(
                None,
                Some(&format!("{probe}: instance data unavailable ({status})")),
            );
            return ptr::null_mut();
        }
    };

    // The lock is never held while managed code runs: callbacks and getters
    // may call back into this addon.
    let latch = shared.lock().latch().clone();
    let mut call = ProbeContext::with_latch(latch);
    let completion = invoke(&mut call, &mut env, probe, &argv[..argc.min(MAX_ARGS)]);
    {
        let mut ctx = shared.lock();
        ctx.absorb(call);
        for diagnostic in ctx.drain_diagnostics() {
            println!("{diagnostic}");
        }
    }

    match completion {
        Completion::Return(value) => value,
        // A null return reads as `undefined` in JavaScript.
        Completion::Success | Completion::Throw => ptr::null_mut(),
    }
}

fn export_probe(raw: napi_env, exports: napi_value, index: usize, probe: ProbeName) -> AbiResult<()> {
    let name = CString::new(probe.as_str()).map_err(|_| Status::InvalidArg)?;
    let mut function: napi_value = ptr::null_mut();
    napi_call!(napi_create_function(
        raw,
        name.as_ptr(),
        sys::NAPI_AUTO_LENGTH,
        Some(probe_entry),
        ptr::without_provenance_mut(index),
        &mut function
    ))?;
    napi_call!(napi_set_named_property(raw, exports, name.as_ptr(), function))
}

fn register(raw: napi_env, exports: napi_value) -> AbiResult<()> {
    install_context(raw)?;
    for (index, probe) in ProbeName::ALL.into_iter().enumerate() {
        export_probe(raw, exports, index, probe)?;
    }
    Ok(())
}

/// Module entry point looked up by the Node-API loader.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn napi_register_module_v1(raw: napi_env, exports: napi_value) -> napi_value {
    match register(raw, exports) {
        Ok(()) => exports,
        Err(status) => {
            // SAFETY: called by the loader with the loading environment.
            let mut env = unsafe { NapiEnv::from_raw(raw) };
            let _ = env.throw_error(None, Some(&format!("napiprobe: registration failed with {status}")));
            ptr::null_mut()
        }
    }
}
