//! Capture of an exception thrown by a managed callback.

use napiprobe_abi::{AbiCall, Env, Status};

use crate::completion::Completion;
use crate::context::{DiagnosticEvent, ProbeContext};
use crate::error::{ProbeError, ProbeResult, Required, ensure};
use crate::name::ProbeName;

const PROBE: ProbeName = ProbeName::CallAndGetException;

/// Call `callback` (which must throw), then capture and clear the exception.
///
/// The exception value is returned to the caller; its runtime type is
/// recorded as a diagnostic. No exception is pending afterwards.
pub fn call_and_get_exception<E: Env>(
    ctx: &mut ProbeContext,
    env: &mut E,
    callback: E::Value,
) -> ProbeResult<Completion<E::Value>> {
    let undefined = env.get_undefined().required(AbiCall::GetUndefined)?;

    let call = env.call_function(undefined, callback, &[]);
    if !matches!(call, Err(Status::PendingException)) {
        return Err(ProbeError::unexpected(
            PROBE,
            AbiCall::CallFunction,
            "napi_pending_exception",
            &call,
        ));
    }

    let pending = env
        .is_exception_pending()
        .required(AbiCall::IsExceptionPending)?;
    ensure(pending, PROBE, "exception pending after callback threw")?;

    let exception = env
        .get_and_clear_last_exception()
        .required(AbiCall::GetAndClearLastException)?;

    let value_type = env.type_of(exception).required(AbiCall::Typeof)?;
    ctx.record(PROBE, DiagnosticEvent::ThrownExceptionType, value_type);

    let pending = env
        .is_exception_pending()
        .required(AbiCall::IsExceptionPending)?;
    ensure(!pending, PROBE, "no exception pending after capture")?;

    Ok(Completion::Return(exception))
}
