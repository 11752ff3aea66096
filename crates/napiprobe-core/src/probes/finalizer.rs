//! Deferred finalization of a wrapped object.
//!
//! `create_ref_with_finalizer` wraps a fresh object with a native finalizer
//! and returns immediately. When the environment reclaims the object, the
//! finalizer optionally opens and closes a handle scope (many ABIs restrict
//! what may run during teardown), releases its hint and fires the latch.

use napiprobe_abi::{AbiCall, Env, FinalizeError, Finalizer};

use crate::completion::Completion;
use crate::context::ProbeContext;
use crate::error::{ProbeResult, Required};
use crate::latch::FinalizeLatch;

/// Data owned by the probe until the finalizer runs, then by the finalizer.
#[derive(Debug)]
pub struct FinalizerHint {
    reentrant: bool,
    latch: FinalizeLatch,
}

impl FinalizerHint {
    #[must_use]
    pub fn new(reentrant: bool, latch: FinalizeLatch) -> Self {
        Self { reentrant, latch }
    }

    /// Finalizer body. Consumes the hint, so it can only be released once.
    pub fn finalize<E: Env>(self: Box<Self>, env: &mut E) -> Result<(), FinalizeError> {
        let Self { reentrant, latch } = *self;
        if reentrant {
            let scope = env.open_handle_scope().map_err(|status| FinalizeError {
                call: AbiCall::OpenHandleScope,
                status,
            })?;
            env.close_handle_scope(scope).map_err(|status| FinalizeError {
                call: AbiCall::CloseHandleScope,
                status,
            })?;
        }
        latch.fire();
        Ok(())
    }
}

pub fn create_ref_with_finalizer<E: Env>(
    ctx: &ProbeContext,
    env: &mut E,
    reentrant: bool,
) -> ProbeResult<Completion<E::Value>> {
    let object = env.create_object().required(AbiCall::CreateObject)?;

    let hint = Box::new(FinalizerHint::new(reentrant, ctx.latch().clone()));
    let finalizer: Finalizer<E> = Box::new(move |env: &mut E| hint.finalize(env));

    // Weak reference; the object stays collectable.
    let _reference = env.wrap(object, finalizer).required(AbiCall::Wrap)?;
    Ok(Completion::Success)
}

pub fn was_finalize_called<E: Env>(
    ctx: &ProbeContext,
    env: &mut E,
) -> ProbeResult<Completion<E::Value>> {
    let called = env
        .get_boolean(ctx.was_finalize_called())
        .required(AbiCall::GetBoolean)?;
    Ok(Completion::Return(called))
}
