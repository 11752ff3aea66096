// conformance_fixtures_test.rs
// Runs the checked-in conformance fixtures against the model under both profiles.

use std::path::{Path, PathBuf};

use napiprobe_core::ProbeName;
use napiprobe_harness::capture::{capture_set, profile_divergences};
use napiprobe_harness::fixtures::load_dir;
use napiprobe_harness::traceability::TraceabilityMatrix;
use napiprobe_harness::{FixtureSet, TestRunner, VerificationSummary};
use napiprobe_model::ModelProfile;

fn repo_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

fn fixture_sets() -> Vec<FixtureSet> {
    let dir = repo_root().join("tests/conformance/fixtures");
    load_dir(&dir)
        .unwrap_or_else(|e| panic!("fixtures in {} should load: {e}", dir.display()))
        .into_iter()
        .map(|(_, set)| set)
        .collect()
}

#[test]
fn every_family_is_present() {
    let families: Vec<String> = fixture_sets().into_iter().map(|set| set.family).collect();
    for family in ["array", "errors", "exception", "finalizer", "property", "type_tag"] {
        assert!(families.iter().any(|f| f == family), "missing fixture family {family}");
    }
}

#[test]
fn fixtures_pass_under_each_profile() {
    for profile in ModelProfile::ALL {
        let runner = TestRunner::new("fixture-verify", profile);
        let results = fixture_sets().iter().flat_map(|set| runner.run(set)).collect();
        let summary = VerificationSummary::from_results(results);
        assert!(summary.total > 0);
        let failures: Vec<String> = summary
            .failures()
            .map(|r| format!("{}\n{}", r.case_name, r.diff.as_deref().unwrap_or("")))
            .collect();
        assert!(
            summary.all_passed(),
            "{} failures under {}:\n{}",
            summary.failed,
            profile.as_str(),
            failures.join("\n")
        );
    }
}

#[test]
fn profiles_observe_identical_outcomes() {
    for set in fixture_sets() {
        let captured = capture_set(&set, &ModelProfile::ALL);
        let divergences = profile_divergences(&captured);
        assert!(
            divergences.is_empty(),
            "{} diverges between profiles: {divergences:#?}",
            set.family
        );
    }
}

#[test]
fn every_probe_has_fixture_coverage() {
    let matrix = TraceabilityMatrix::from_fixtures(&fixture_sets());
    assert_eq!(matrix.len(), ProbeName::ALL.len());
    let uncovered: Vec<ProbeName> = matrix.uncovered().collect();
    assert!(uncovered.is_empty(), "uncovered probes: {uncovered:?}");
}

#[test]
fn exception_capture_reports_thrown_types() {
    let set = fixture_sets()
        .into_iter()
        .find(|set| set.family == "exception")
        .expect("exception fixtures");
    let captured = capture_set(&set, &[ModelProfile::Node]);
    let number = captured
        .iter()
        .find(|obs| obs.case == "captures_thrown_number")
        .expect("number case");
    assert_eq!(number.diagnostics, ["typeof thrown exception = number"]);
    assert_eq!(number.observed, "returns 42");
}
