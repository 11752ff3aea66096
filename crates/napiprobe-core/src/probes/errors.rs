//! Error construction through the four error-kind entry points.
//!
//! Both probes dispatch on [`ErrorKind`]. `throw_error` uses the throwers
//! (`napi_throw_*_error`), `create_and_throw_error` uses the constructors
//! (`napi_create_*_error`) and then throws the result itself.

use napiprobe_abi::{AbiCall, Env, ErrorKind, Status, ValueType};

use crate::completion::Completion;
use crate::error::{ProbeError, ProbeResult, Required};
use crate::name::ProbeName;

/// Statuses accepted when an error constructor rejects its arguments.
///
/// Node and Bun validate `code`/`msg` in different orders, so the same bad
/// input can surface as either status. The oracle accepts both and does not
/// pin one implementation's order.
pub const CREATE_ERROR_REJECTIONS: [Status; 2] = [Status::StringExpected, Status::InvalidArg];

/// Throw an error of `kind` with optional `code` and `msg`.
///
/// A missing message must be rejected with `napi_invalid_arg` and nothing is
/// thrown; the probe then reports success. With a message the throw must
/// succeed and the probe returns no value.
pub fn throw_error<E: Env>(
    env: &mut E,
    code: Option<&str>,
    msg: Option<&str>,
    kind: ErrorKind,
) -> ProbeResult<Completion<E::Value>> {
    let thrown = kind.thrower::<E>()(env, code, msg);
    match msg {
        None => match thrown {
            Err(Status::InvalidArg) => Ok(Completion::Success),
            other => Err(ProbeError::unexpected(
                ProbeName::ThrowError,
                kind.throw_call(),
                "napi_invalid_arg",
                &other,
            )),
        },
        Some(_) => match thrown {
            Ok(()) => Ok(Completion::Throw),
            other => Err(ProbeError::unexpected(
                ProbeName::ThrowError,
                kind.throw_call(),
                "napi_ok",
                &other,
            )),
        },
    }
}

/// Construct an error of `kind` from managed `code`/`msg` values, then throw it.
///
/// Managed `null` is passed as an absent argument. Construction must fail
/// when `msg` is absent or not a string, or when `code` is present and not a
/// string; either status in [`CREATE_ERROR_REJECTIONS`] is accepted. Any other
/// input must construct successfully and the probe throws the result.
pub fn create_and_throw_error<E: Env>(
    env: &mut E,
    code: E::Value,
    msg: E::Value,
    kind: ErrorKind,
) -> ProbeResult<Completion<E::Value>> {
    let code = non_null(env, code)?;
    let msg = non_null(env, msg)?;

    let msg_valid = match msg {
        Some(msg) => is_string(env, msg)?,
        None => false,
    };
    let code_valid = match code {
        Some(code) => is_string(env, code)?,
        None => true,
    };

    let created = kind.constructor::<E>()(env, code, msg);

    if !(msg_valid && code_valid) {
        return match created {
            Err(status) if CREATE_ERROR_REJECTIONS.contains(&status) => Ok(Completion::Success),
            other => Err(ProbeError::unexpected(
                ProbeName::CreateAndThrowError,
                kind.create_call(),
                "napi_string_expected or napi_invalid_arg",
                &other,
            )),
        };
    }

    let error = match created {
        Ok(error) => error,
        Err(status) => {
            return Err(ProbeError::UnexpectedStatus {
                probe: ProbeName::CreateAndThrowError,
                call: kind.create_call(),
                expected: "napi_ok",
                actual: status,
            });
        }
    };
    env.throw(error).required(AbiCall::Throw)?;
    Ok(Completion::Throw)
}

fn non_null<E: Env>(env: &mut E, value: E::Value) -> ProbeResult<Option<E::Value>> {
    let value_type = env.type_of(value).required(AbiCall::Typeof)?;
    Ok((value_type != ValueType::Null).then_some(value))
}

fn is_string<E: Env>(env: &mut E, value: E::Value) -> ProbeResult<bool> {
    Ok(env.type_of(value).required(AbiCall::Typeof)? == ValueType::String)
}
