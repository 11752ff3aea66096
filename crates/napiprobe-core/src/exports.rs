//! Managed entry points: argument decoding and probe-fatal reporting.
//!
//! [`invoke`] is what a registered native function does: read its managed
//! arguments, run one probe, and turn a [`ProbeError`] into a thrown managed
//! `Error` (unless the failing call already left an exception pending).

use napiprobe_abi::{AbiCall, Env, ErrorKind, ValueType};

use crate::completion::Completion;
use crate::context::ProbeContext;
use crate::error::{ProbeError, ProbeResult, Required};
use crate::name::ProbeName;
use crate::probes;

/// Run `probe` with managed `args`. Missing arguments read as `undefined`.
pub fn invoke<E: Env>(
    ctx: &mut ProbeContext,
    env: &mut E,
    probe: ProbeName,
    args: &[E::Value],
) -> Completion<E::Value> {
    match dispatch(ctx, env, probe, args) {
        Ok(completion) => completion,
        Err(err) => {
            raise(env, probe, &err);
            Completion::Throw
        }
    }
}

/// Run `probe` without converting failures, for callers that report them
/// some other way.
pub fn dispatch<E: Env>(
    ctx: &mut ProbeContext,
    env: &mut E,
    probe: ProbeName,
    args: &[E::Value],
) -> ProbeResult<Completion<E::Value>> {
    match probe {
        ProbeName::CreateRefWithFinalizer => {
            let reentrant = arg(env, args, 0)?;
            let reentrant = env
                .get_value_bool(reentrant)
                .required(AbiCall::GetValueBool)?;
            probes::create_ref_with_finalizer(ctx, env, reentrant)
        }
        ProbeName::WasFinalizeCalled => probes::was_finalize_called(ctx, env),
        ProbeName::CallAndGetException => {
            let callback = arg(env, args, 0)?;
            probes::call_and_get_exception(ctx, env, callback)
        }
        ProbeName::ThrowError => {
            let (code, msg, kind) = (arg(env, args, 0)?, arg(env, args, 1)?, arg(env, args, 2)?);
            let code = optional_string(env, code)?;
            let msg = optional_string(env, msg)?;
            let kind = error_kind(env, kind)?;
            probes::throw_error(env, code.as_deref(), msg.as_deref(), kind)
        }
        ProbeName::CreateAndThrowError => {
            let code = arg(env, args, 0)?;
            let msg = arg(env, args, 1)?;
            let kind = arg(env, args, 2)?;
            let kind = error_kind(env, kind)?;
            probes::create_and_throw_error(env, code, msg, kind)
        }
        ProbeName::PerformGet => {
            let object = arg(env, args, 0)?;
            let key = arg(env, args, 1)?;
            probes::perform_get(ctx, env, object, key)
        }
        ProbeName::MakeEmptyArray => {
            let size = arg(env, args, 0)?;
            let size = uint32(env, size)?;
            probes::make_empty_array(env, size)
        }
        ProbeName::AddTag => {
            let (object, lower, upper) = tagged_args(env, args)?;
            probes::add_tag(env, object, lower, upper)
        }
        ProbeName::CheckTag => {
            let (object, lower, upper) = tagged_args(env, args)?;
            probes::check_tag(env, object, lower, upper)
        }
    }
}

/// Throw a generic `Error` describing `err`, leaving any pending exception
/// in place.
pub fn raise<E: Env>(env: &mut E, probe: ProbeName, err: &ProbeError) {
    if matches!(env.is_exception_pending(), Ok(true)) {
        return;
    }
    let message = match err {
        ProbeError::Call { .. } | ProbeError::UnknownErrorKind(_) => format!("{probe}: {err}"),
        ProbeError::UnexpectedStatus { .. } | ProbeError::Assertion { .. } => err.to_string(),
    };
    // Nothing further can be reported if the ABI refuses the throw as well.
    let _ = env.throw_error(None, Some(&message));
}

fn arg<E: Env>(env: &mut E, args: &[E::Value], index: usize) -> ProbeResult<E::Value> {
    match args.get(index) {
        Some(value) => Ok(*value),
        None => env.get_undefined().required(AbiCall::GetUndefined),
    }
}

fn tagged_args<E: Env>(env: &mut E, args: &[E::Value]) -> ProbeResult<(E::Value, u32, u32)> {
    let object = arg(env, args, 0)?;
    let lower = arg(env, args, 1)?;
    let upper = arg(env, args, 2)?;
    Ok((object, uint32(env, lower)?, uint32(env, upper)?))
}

fn uint32<E: Env>(env: &mut E, value: E::Value) -> ProbeResult<u32> {
    env.get_value_uint32(value)
        .required(AbiCall::GetValueUint32)
}

fn string<E: Env>(env: &mut E, value: E::Value) -> ProbeResult<String> {
    env.get_value_string_utf8(value, usize::MAX)
        .required(AbiCall::GetValueStringUtf8)
}

/// Strings pass through; every other type reads as absent.
fn optional_string<E: Env>(env: &mut E, value: E::Value) -> ProbeResult<Option<String>> {
    if env.type_of(value).required(AbiCall::Typeof)? == ValueType::String {
        string(env, value).map(Some)
    } else {
        Ok(None)
    }
}

fn error_kind<E: Env>(env: &mut E, value: E::Value) -> ProbeResult<ErrorKind> {
    let kind = string(env, value)?;
    ErrorKind::parse(&kind).ok_or(ProbeError::UnknownErrorKind(kind))
}
