#![no_main]
use libfuzzer_sys::fuzz_target;
use napiprobe_harness::FixtureSet;
use napiprobe_harness::runner::execute_case;
use napiprobe_model::ModelProfile;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(set) = FixtureSet::from_json(json) else {
        return;
    };
    if set.validate().is_err() {
        return;
    }
    // Arbitrary fixtures may fail their expectations; running them must not panic.
    for case in &set.cases {
        for profile in case.profile.profiles() {
            let run = execute_case(case, profile);
            assert_eq!(run.steps.len(), case.steps.len());
        }
    }
});
