//! Property reads through the named and the generic access paths.

use napiprobe_abi::{AbiCall, Env, Status, ValueType};

use crate::completion::Completion;
use crate::context::{DiagnosticEvent, ProbeContext};
use crate::error::{ProbeError, ProbeResult, Required};
use crate::name::ProbeName;

const PROBE: ProbeName = ProbeName::PerformGet;

/// Buffer size for the named-property fast path. Longer keys are truncated.
pub const NAMED_KEY_CAPACITY: usize = 1024;

/// Read `object[key]`.
///
/// String keys first go through `napi_get_named_property`; a pending
/// exception there short-circuits with the success marker and leaves the
/// exception for the caller. Every key then goes through `napi_get_property`,
/// whose only permitted failure is a pending exception.
pub fn perform_get<E: Env>(
    ctx: &mut ProbeContext,
    env: &mut E,
    object: E::Value,
    key: E::Value,
) -> ProbeResult<Completion<E::Value>> {
    if env.type_of(key).required(AbiCall::Typeof)? == ValueType::String {
        let name = env
            .get_value_string_utf8(key, NAMED_KEY_CAPACITY)
            .required(AbiCall::GetValueStringUtf8)?;
        match env.get_named_property(object, &name) {
            Ok(value) => record_type(ctx, env, value)?,
            Err(Status::PendingException) => return Ok(Completion::Success),
            Err(status) => {
                return Err(ProbeError::UnexpectedStatus {
                    probe: PROBE,
                    call: AbiCall::GetNamedProperty,
                    expected: "napi_ok or napi_pending_exception",
                    actual: status,
                });
            }
        }
    }

    match env.get_property(object, key) {
        Ok(value) => {
            record_type(ctx, env, value)?;
            Ok(Completion::Return(value))
        }
        Err(Status::PendingException) => Ok(Completion::Success),
        Err(status) => Err(ProbeError::UnexpectedStatus {
            probe: PROBE,
            call: AbiCall::GetProperty,
            expected: "napi_ok or napi_pending_exception",
            actual: status,
        }),
    }
}

fn record_type<E: Env>(ctx: &mut ProbeContext, env: &mut E, value: E::Value) -> ProbeResult<()> {
    let value_type = env.type_of(value).required(AbiCall::Typeof)?;
    ctx.record(PROBE, DiagnosticEvent::ResolvedValueType, value_type);
    Ok(())
}
