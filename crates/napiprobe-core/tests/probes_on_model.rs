//! Probes driven through `invoke` against the in-memory model environment.

use napiprobe_abi::{AbiCall, ErrorKind, Status, ValueType};
use napiprobe_core::probes::CREATE_ERROR_REJECTIONS;
use napiprobe_core::{Completion, DiagnosticEvent, ProbeContext, ProbeName, invoke};
use napiprobe_model::{Handle, ModelConfig, ModelEnv, ModelProfile};

fn call(
    ctx: &mut ProbeContext,
    env: &mut ModelEnv,
    probe: ProbeName,
    args: &[Handle],
) -> Completion<Handle> {
    env.with_call_scope(|env| invoke(ctx, env, probe, args))
}

fn envs() -> Vec<ModelEnv> {
    ModelProfile::ALL
        .into_iter()
        .map(|profile| ModelEnv::new(ModelConfig::with_profile(profile)))
        .collect()
}

fn thrown_message(env: &mut ModelEnv) -> (ErrorKind, String) {
    let exception = env.take_exception().expect("exception pending");
    let kind = env.error_kind(exception).expect("error object");
    let message = env
        .property(exception, "message")
        .and_then(|message| env.string_value(message))
        .expect("string message")
        .to_string();
    (kind, message)
}

// -- finalizer ---------------------------------------------------------------

#[test]
fn finalizer_runs_once_per_registration_after_collection() {
    for reentrant in [false, true] {
        let mut env = ModelEnv::default();
        let mut ctx = ProbeContext::new();
        let flag = env.boolean(reentrant);

        let out = call(&mut ctx, &mut env, ProbeName::CreateRefWithFinalizer, &[flag]);
        assert_eq!(out, Completion::Success);
        assert!(!ctx.was_finalize_called(), "finalizer ran before collection");

        let stats = env.collect_garbage();
        assert_eq!(stats.finalized, 1);
        assert_eq!(ctx.latch().count(), 1);
        assert!(env.fatal_errors().is_empty());

        env.collect_garbage();
        assert_eq!(ctx.latch().count(), 1, "finalizer ran twice");

        let called = call(&mut ctx, &mut env, ProbeName::WasFinalizeCalled, &[]);
        assert_eq!(called, Completion::Return(Handle::TRUE));
    }
}

#[test]
fn reentrant_finalizer_opens_and_closes_a_scope() {
    let mut env = ModelEnv::default();
    let mut ctx = ProbeContext::new();
    call(&mut ctx, &mut env, ProbeName::CreateRefWithFinalizer, &[Handle::TRUE]);
    env.clear_call_log();
    env.collect_garbage();
    assert_eq!(
        env.call_log(),
        [AbiCall::OpenHandleScope, AbiCall::CloseHandleScope]
    );

    call(&mut ctx, &mut env, ProbeName::CreateRefWithFinalizer, &[Handle::FALSE]);
    env.clear_call_log();
    env.collect_garbage();
    assert!(env.call_log().is_empty());
    assert_eq!(ctx.latch().count(), 2);
}

#[test]
fn rejected_finalizer_scope_is_fatal_and_leaves_latch_clear() {
    let mut env = ModelEnv::new(ModelConfig {
        scopes_in_finalizer: false,
        ..ModelConfig::default()
    });
    let mut ctx = ProbeContext::new();
    call(&mut ctx, &mut env, ProbeName::CreateRefWithFinalizer, &[Handle::TRUE]);
    env.collect_garbage();

    assert!(!ctx.was_finalize_called());
    let fatal = env.fatal_errors();
    assert_eq!(fatal.len(), 1);
    assert_eq!(fatal[0].call, AbiCall::OpenHandleScope);
}

#[test]
fn rooted_wrapped_object_is_not_finalized() {
    let mut env = ModelEnv::default();
    let mut ctx = ProbeContext::new();
    // Everything allocated while this outer scope is open stays reachable.
    env.with_call_scope(|env| {
        invoke(&mut ctx, env, ProbeName::CreateRefWithFinalizer, &[Handle::FALSE]);
        env.collect_garbage();
    });
    assert!(!ctx.was_finalize_called());
    env.collect_garbage();
    assert!(ctx.was_finalize_called());
}

#[test]
fn latch_reset_between_runs() {
    let mut env = ModelEnv::default();
    let mut ctx = ProbeContext::new();
    call(&mut ctx, &mut env, ProbeName::CreateRefWithFinalizer, &[Handle::FALSE]);
    env.collect_garbage();
    assert!(ctx.was_finalize_called());
    ctx.reset();
    let called = call(&mut ctx, &mut env, ProbeName::WasFinalizeCalled, &[]);
    assert_eq!(called, Completion::Return(Handle::FALSE));
}

#[test]
fn wrap_failure_is_probe_fatal() {
    let mut env = ModelEnv::default();
    let mut ctx = ProbeContext::new();
    env.inject_fault(AbiCall::Wrap, Status::GenericFailure);
    let out = call(&mut ctx, &mut env, ProbeName::CreateRefWithFinalizer, &[Handle::TRUE]);
    assert_eq!(out, Completion::Throw);
    let (kind, message) = thrown_message(&mut env);
    assert_eq!(kind, ErrorKind::Error);
    assert!(message.contains("napi_wrap"), "{message}");
    assert_eq!(env.pending_finalizers(), 0);
}

// -- exception capture ---------------------------------------------------------

#[test]
fn captured_exception_keeps_its_type_and_clears_pending() {
    let mut env = ModelEnv::default();
    let mut ctx = ProbeContext::new();
    let cases = [
        env.error_value(ErrorKind::TypeError, "boom", None),
        env.string("plain string"),
        env.number(7.0),
        Handle::NULL,
    ];
    for thrown in cases {
        env.root(thrown);
        let callback = env.thrower(thrown);
        env.root(callback);
        let out = call(&mut ctx, &mut env, ProbeName::CallAndGetException, &[callback]);
        let captured = out.value().expect("exception returned");
        assert!(env.strict_equals(captured, thrown));
        assert_eq!(env.pending_exception(), None);

        let diagnostics = ctx.drain_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].event, DiagnosticEvent::ThrownExceptionType);
        assert_eq!(Some(diagnostics[0].value_type), env.value_type(thrown));
    }
}

#[test]
fn non_throwing_callback_is_probe_fatal() {
    let mut env = ModelEnv::default();
    let mut ctx = ProbeContext::new();
    let value = env.number(1.0);
    let callback = env.returner(value);
    let out = call(&mut ctx, &mut env, ProbeName::CallAndGetException, &[callback]);
    assert_eq!(out, Completion::Throw);
    let (_, message) = thrown_message(&mut env);
    assert!(message.contains("napi_call_function returned napi_ok"), "{message}");
}

#[test]
fn non_function_callback_is_probe_fatal() {
    let mut env = ModelEnv::default();
    let mut ctx = ProbeContext::new();
    let object = env.object();
    let out = call(&mut ctx, &mut env, ProbeName::CallAndGetException, &[object]);
    assert_eq!(out, Completion::Throw);
    let (_, message) = thrown_message(&mut env);
    assert!(message.contains("napi_function_expected"), "{message}");
}

// -- throw_error ---------------------------------------------------------------

#[test]
fn throw_error_without_message_is_rejected_for_every_kind() {
    for mut env in envs() {
        let mut ctx = ProbeContext::new();
        for kind in ErrorKind::ALL {
            let kind = env.string(kind.as_str());
            let out = call(
                &mut ctx,
                &mut env,
                ProbeName::ThrowError,
                &[Handle::UNDEFINED, Handle::UNDEFINED, kind],
            );
            assert_eq!(out, Completion::Success);
            assert_eq!(env.pending_exception(), None);
        }
    }
}

#[test]
fn throw_error_with_message_throws_the_selected_kind() {
    for mut env in envs() {
        let mut ctx = ProbeContext::new();
        for kind in ErrorKind::ALL {
            let code = env.string("E_PROBE");
            let msg = env.string("msg");
            let kind_arg = env.string(kind.as_str());
            let out = call(&mut ctx, &mut env, ProbeName::ThrowError, &[code, msg, kind_arg]);
            assert_eq!(out, Completion::Throw);

            let exception = env.take_exception().expect("thrown");
            assert_eq!(env.error_kind(exception), Some(kind));
            let code = env.property(exception, "code").and_then(|c| env.string_value(c));
            assert_eq!(code, Some("E_PROBE"));
        }
    }
}

#[test]
fn throw_range_error_without_code() {
    let mut env = ModelEnv::default();
    let mut ctx = ProbeContext::new();
    let msg = env.string("msg");
    let kind = env.string("range_error");
    let out = call(&mut ctx, &mut env, ProbeName::ThrowError, &[Handle::UNDEFINED, msg, kind]);
    assert_eq!(out, Completion::Throw);
    assert_eq!(thrown_message(&mut env), (ErrorKind::RangeError, "msg".to_string()));
}

#[test]
fn unknown_error_kind_is_rejected() {
    let mut env = ModelEnv::default();
    let mut ctx = ProbeContext::new();
    let msg = env.string("msg");
    let kind = env.string("eval_error");
    let out = call(&mut ctx, &mut env, ProbeName::ThrowError, &[Handle::UNDEFINED, msg, kind]);
    assert_eq!(out, Completion::Throw);
    let (kind, message) = thrown_message(&mut env);
    assert_eq!(kind, ErrorKind::Error);
    assert!(message.contains("unknown error kind 'eval_error'"), "{message}");
}

// -- create_and_throw_error ------------------------------------------------------

#[test]
fn create_error_rejections_return_success_on_both_profiles() {
    for mut env in envs() {
        let mut ctx = ProbeContext::new();
        let string = env.string("s");
        let number = env.number(1.0);
        let object = env.object();
        // (code, msg): msg null, msg non-string, code non-string.
        let invalid = [
            (Handle::NULL, Handle::NULL),
            (string, Handle::NULL),
            (Handle::NULL, number),
            (number, Handle::NULL),
            (object, string),
            (Handle::TRUE, string),
            (string, Handle::UNDEFINED),
        ];
        for kind in ErrorKind::ALL {
            for (code, msg) in invalid {
                let kind_arg = env.string(kind.as_str());
                env.root(kind_arg);
                let out = call(
                    &mut ctx,
                    &mut env,
                    ProbeName::CreateAndThrowError,
                    &[code, msg, kind_arg],
                );
                assert_eq!(
                    out,
                    Completion::Success,
                    "{:?} code={} msg={}",
                    env.config().profile,
                    env.describe(code),
                    env.describe(msg)
                );
                assert_eq!(env.pending_exception(), None);
            }
        }
    }
}

#[test]
fn create_error_with_valid_arguments_throws() {
    for mut env in envs() {
        let mut ctx = ProbeContext::new();
        let msg = env.string("m");
        let kind = env.string("syntax_error");
        let out = call(
            &mut ctx,
            &mut env,
            ProbeName::CreateAndThrowError,
            &[Handle::NULL, msg, kind],
        );
        assert_eq!(out, Completion::Throw);
        assert_eq!(thrown_message(&mut env), (ErrorKind::SyntaxError, "m".to_string()));

        let code = env.string("E_X");
        let msg = env.string("with code");
        let kind = env.string("type_error");
        let out = call(&mut ctx, &mut env, ProbeName::CreateAndThrowError, &[code, msg, kind]);
        assert_eq!(out, Completion::Throw);
        let exception = env.take_exception().expect("thrown");
        assert_eq!(env.error_kind(exception), Some(ErrorKind::TypeError));
        let code = env.property(exception, "code").and_then(|c| env.string_value(c));
        assert_eq!(code, Some("E_X"));
    }
}

#[test]
fn create_error_statuses_differ_between_profiles_but_both_pass() {
    let observed: Vec<Status> = envs()
        .iter_mut()
        .map(|env| {
            use napiprobe_abi::Env;
            let code = env.number(5.0);
            env.create_error(Some(code), None).expect_err("rejected")
        })
        .collect();
    assert_eq!(observed, vec![Status::InvalidArg, Status::StringExpected]);
    assert!(observed.iter().all(|status| CREATE_ERROR_REJECTIONS.contains(status)));
}

#[test]
fn create_error_unexpected_rejection_is_probe_fatal() {
    let mut env = ModelEnv::default();
    let mut ctx = ProbeContext::new();
    env.inject_fault(AbiCall::CreateError, Status::GenericFailure);
    let msg = env.string("m");
    let kind = env.string("error");
    let out = call(&mut ctx, &mut env, ProbeName::CreateAndThrowError, &[Handle::NULL, msg, kind]);
    assert_eq!(out, Completion::Throw);
    let (_, message) = thrown_message(&mut env);
    assert!(
        message.contains("napi_create_error returned napi_generic_failure, expected napi_ok"),
        "{message}"
    );
}

// -- perform_get ---------------------------------------------------------------

#[test]
fn perform_get_reads_named_and_keyed_properties() {
    let mut env = ModelEnv::default();
    let mut ctx = ProbeContext::new();
    let one = env.number(1.0);
    let object = env.object_with(&[("a", one)]);
    env.root(object);

    let key = env.string("a");
    let out = call(&mut ctx, &mut env, ProbeName::PerformGet, &[object, key]);
    assert_eq!(out, Completion::Return(one));
    let diagnostics = ctx.drain_diagnostics();
    assert_eq!(diagnostics.len(), 2, "named and generic path both log");
    assert!(diagnostics.iter().all(|d| d.value_type == ValueType::Number));

    let missing = env.string("missing");
    let out = call(&mut ctx, &mut env, ProbeName::PerformGet, &[object, missing]);
    assert_eq!(out, Completion::Return(Handle::UNDEFINED));
    ctx.drain_diagnostics();

    let array = env.array(3, &[(2, one)]);
    let index = env.number(2.0);
    let out = call(&mut ctx, &mut env, ProbeName::PerformGet, &[array, index]);
    assert_eq!(out, Completion::Return(one));
    let diagnostics = ctx.drain_diagnostics();
    assert_eq!(diagnostics.len(), 1, "non-string key skips the named path");
}

#[test]
fn perform_get_throwing_getter_leaves_exception_pending() {
    let mut env = ModelEnv::default();
    let mut ctx = ProbeContext::new();
    let thrown = env.error_value(ErrorKind::Error, "getter threw", None);
    let object = env.object();
    env.define_throwing_getter(object, "boom", thrown);

    let key = env.string("boom");
    let out = call(&mut ctx, &mut env, ProbeName::PerformGet, &[object, key]);
    assert_eq!(out, Completion::Success);
    assert_eq!(env.pending_exception(), Some(thrown));
    assert!(ctx.drain_diagnostics().is_empty());
}

#[test]
fn perform_get_generic_path_exception_returns_success() {
    let mut env = ModelEnv::default();
    let mut ctx = ProbeContext::new();
    let thrown = env.string("numeric getter");
    let object = env.object();
    env.define_throwing_getter(object, "3", thrown);
    let key = env.number(3.0);
    let out = call(&mut ctx, &mut env, ProbeName::PerformGet, &[object, key]);
    assert_eq!(out, Completion::Success);
    assert_eq!(env.take_exception(), Some(thrown));
}

#[test]
fn perform_get_other_generic_failure_is_probe_fatal() {
    let mut env = ModelEnv::default();
    let mut ctx = ProbeContext::new();
    let object = env.object();
    let key = env.number(0.0);
    env.inject_fault(AbiCall::GetProperty, Status::GenericFailure);
    let out = call(&mut ctx, &mut env, ProbeName::PerformGet, &[object, key]);
    assert_eq!(out, Completion::Throw);
    let (_, message) = thrown_message(&mut env);
    assert!(message.contains("napi_get_property returned napi_generic_failure"), "{message}");
}

// -- type tags -----------------------------------------------------------------

#[test]
fn tag_round_trip() {
    let mut env = ModelEnv::default();
    let mut ctx = ProbeContext::new();
    let object = env.object();
    env.root(object);
    let lower = env.number(0xDEAD_BEEF_u32.into());
    let upper = env.number(42.0);
    let upper_plus = env.number(43.0);
    for handle in [lower, upper, upper_plus] {
        env.root(handle);
    }

    let out = call(&mut ctx, &mut env, ProbeName::AddTag, &[object, lower, upper]);
    assert_eq!(out, Completion::Success);

    let same = call(&mut ctx, &mut env, ProbeName::CheckTag, &[object, lower, upper]);
    assert_eq!(same, Completion::Return(Handle::TRUE));
    let other = call(&mut ctx, &mut env, ProbeName::CheckTag, &[object, lower, upper_plus]);
    assert_eq!(other, Completion::Return(Handle::FALSE));

    let fresh = env.object();
    let untagged = call(&mut ctx, &mut env, ProbeName::CheckTag, &[fresh, lower, upper]);
    assert_eq!(untagged, Completion::Return(Handle::FALSE));
}

#[test]
fn retagging_is_probe_fatal() {
    let mut env = ModelEnv::default();
    let mut ctx = ProbeContext::new();
    let object = env.object();
    env.root(object);
    let zero = env.number(0.0);
    env.root(zero);
    assert_eq!(
        call(&mut ctx, &mut env, ProbeName::AddTag, &[object, zero, zero]),
        Completion::Success
    );
    assert_eq!(
        call(&mut ctx, &mut env, ProbeName::AddTag, &[object, zero, zero]),
        Completion::Throw
    );
    let (_, message) = thrown_message(&mut env);
    assert!(message.contains("napi_type_tag_object"), "{message}");
}

// -- arrays --------------------------------------------------------------------

#[test]
fn empty_array_has_requested_length_and_only_holes() {
    let mut env = ModelEnv::default();
    let mut ctx = ProbeContext::new();
    for size in [0.0, 5.0, f64::from(u32::MAX)] {
        let size_arg = env.number(size);
        let out = call(&mut ctx, &mut env, ProbeName::MakeEmptyArray, &[size_arg]);
        let array = out.value().expect("array returned");
        assert_eq!(env.array_length(array).map(f64::from), Some(size));
        assert_eq!(env.array_element_count(array), Some(0));
    }

    let five = env.number(5.0);
    let array = call(&mut ctx, &mut env, ProbeName::MakeEmptyArray, &[five])
        .value()
        .expect("array");
    assert!((0..5).all(|index| env.is_hole(array, index)));
}

#[test]
fn array_size_must_be_a_number() {
    let mut env = ModelEnv::default();
    let mut ctx = ProbeContext::new();
    let size = env.string("5");
    let out = call(&mut ctx, &mut env, ProbeName::MakeEmptyArray, &[size]);
    assert_eq!(out, Completion::Throw);
    let (_, message) = thrown_message(&mut env);
    assert!(message.contains("napi_number_expected"), "{message}");
}

// -- entry points ----------------------------------------------------------------

#[test]
fn missing_arguments_read_as_undefined() {
    let mut env = ModelEnv::default();
    let mut ctx = ProbeContext::new();
    // No kind string: decoding the kind fails before any throw.
    let out = call(&mut ctx, &mut env, ProbeName::ThrowError, &[]);
    assert_eq!(out, Completion::Throw);
    let (_, message) = thrown_message(&mut env);
    assert!(message.contains("napi_string_expected"), "{message}");
}

#[test]
fn every_probe_uses_only_its_declared_calls() {
    let mut env = ModelEnv::default();
    let mut ctx = ProbeContext::new();
    let msg = env.string("m");
    let kind = env.string("error");
    let key = env.string("k");
    let object = env.object_with(&[("k", msg)]);
    let thrower = env.thrower(msg);
    let two = env.number(2.0);
    for handle in [msg, kind, key, object, thrower, two] {
        env.root(handle);
    }

    let runs: [(ProbeName, Vec<Handle>); 9] = [
        (ProbeName::CreateRefWithFinalizer, vec![Handle::TRUE]),
        (ProbeName::WasFinalizeCalled, vec![]),
        (ProbeName::CallAndGetException, vec![thrower]),
        (ProbeName::ThrowError, vec![Handle::UNDEFINED, msg, kind]),
        (ProbeName::CreateAndThrowError, vec![Handle::NULL, msg, kind]),
        (ProbeName::PerformGet, vec![object, key]),
        (ProbeName::MakeEmptyArray, vec![two]),
        (ProbeName::AddTag, vec![object, two, two]),
        (ProbeName::CheckTag, vec![object, two, two]),
    ];
    for (probe, args) in runs {
        env.clear_call_log();
        call(&mut ctx, &mut env, probe, &args);
        env.take_exception();
        for made in env.call_log() {
            assert!(
                probe.abi_calls().contains(made),
                "{probe} made undeclared call {made}"
            );
        }
    }
}
