#![no_main]
use libfuzzer_sys::fuzz_target;
use napiprobe_abi::ErrorKind;
use napiprobe_core::{Completion, ProbeContext, ProbeName, invoke};
use napiprobe_model::{Handle, ModelConfig, ModelEnv, ModelProfile};

const STRINGS: [&str; 8] = [
    "",
    "a",
    "length",
    "0",
    "error",
    "type_error",
    "range_error",
    "syntax_error",
];

/// Build one managed value from two bytes.
fn value(env: &mut ModelEnv, tag: u8, arg: u8) -> Handle {
    match tag % 10 {
        0 => env.undefined(),
        1 => env.null(),
        2 => env.boolean(arg & 1 == 1),
        3 => env.number(f64::from(arg as i8) * 1.5),
        4 => env.string(STRINGS[usize::from(arg) % STRINGS.len()]),
        5 => {
            let one = env.number(1.0);
            env.object_with(&[("a", one)])
        }
        6 => env.array(u32::from(arg), &[]),
        7 => {
            let thrown = env.string("thrown");
            env.thrower(thrown)
        }
        8 => {
            let thrown = env.number(f64::from(arg));
            let object = env.object();
            env.define_throwing_getter(object, STRINGS[usize::from(arg) % 4], thrown);
            object
        }
        _ => {
            let kind = ErrorKind::ALL[usize::from(arg) % ErrorKind::ALL.len()];
            env.error_value(kind, "m", (arg & 1 == 1).then_some("E_F"))
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&profile, ops)) = data.split_first() else {
        return;
    };
    let profile = ModelProfile::ALL[usize::from(profile) % ModelProfile::ALL.len()];
    let mut env = ModelEnv::new(ModelConfig::with_profile(profile));
    let mut ctx = ProbeContext::new();
    let mut wrapped = 0usize;
    let mut finalized = 0usize;

    for chunk in ops.chunks(7) {
        let &[op, a0, a1, b0, b1, c0, c1] = chunk else {
            break;
        };
        if op == 0xff {
            finalized += env.collect_garbage().finalized;
            assert!(env.fatal_errors().is_empty());
            assert_eq!(ctx.latch().count(), finalized);
            continue;
        }

        let probe = ProbeName::ALL[usize::from(op) % ProbeName::ALL.len()];
        let before = env.open_scope_count();
        let completion = env.with_call_scope(|env| {
            let args = [value(env, a0, a1), value(env, b0, b1), value(env, c0, c1)];
            let scopes = env.open_scope_count();
            let completion = invoke(&mut ctx, env, probe, &args[..probe.arity()]);
            assert_eq!(env.open_scope_count(), scopes, "{probe} left scopes open");
            completion
        });
        assert_eq!(env.open_scope_count(), before);

        match completion {
            Completion::Return(value) => {
                assert!(env.is_alive(value));
                assert!(env.pending_exception().is_none(), "{probe} returned with a pending exception");
            }
            Completion::Throw => assert!(env.pending_exception().is_some(), "{probe} threw nothing"),
            Completion::Success => {}
        }
        if probe == ProbeName::CreateRefWithFinalizer && completion == Completion::Success {
            wrapped += 1;
        }
        env.take_exception();
        let _ = ctx.drain_diagnostics();
    }

    finalized += env.collect_garbage().finalized;
    assert_eq!(finalized, wrapped, "every wrapped object is finalized exactly once");
    assert!(env.fatal_errors().is_empty());
});
