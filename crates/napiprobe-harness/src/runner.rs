//! Test execution engine.
//!
//! Every case runs against a fresh [`ModelEnv`] and [`ProbeContext`]. Each
//! probe call runs inside its own call scope, like a native call from
//! managed code. Afterwards any pending exception is caught, as the managed
//! caller would.

use std::time::Instant;

use napiprobe_abi::{AbiCall, Status, ValueType};
use napiprobe_core::{Completion, ProbeContext, ProbeError, ProbeName, dispatch, raise};
use napiprobe_model::{Handle, ModelConfig, ModelEnv, ModelProfile};
use serde::Serialize;

use crate::diff;
use crate::fixtures::{Expectation, FixtureCase, FixtureSet, JsShape, ProfileSelection, Step};
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome, StreamKind};
use crate::values::{Bindings, materialize, matches, render_value};
use crate::verify::VerificationResult;

/// Outcome of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepRun {
    pub label: String,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
    /// Diagnostic lines the probe emitted.
    pub diagnostics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<ProbeName>,
    /// Type named by the last diagnostic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    /// Set when the probe aborted on a broken ABI contract.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<StepFault>,
}

impl StepRun {
    fn plain(label: impl Into<String>, expected: String, actual: String, passed: bool) -> Self {
        Self {
            label: label.into(),
            expected,
            actual,
            passed,
            diagnostics: Vec::new(),
            probe: None,
            value_type: None,
            fault: None,
        }
    }
}

/// A probe-fatal failure seen during a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFault {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<AbiCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    pub message: String,
}

impl From<&ProbeError> for StepFault {
    fn from(err: &ProbeError) -> Self {
        Self {
            symbol: err.call(),
            status: err.status(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one case under one profile.
#[derive(Debug, Clone, Serialize)]
pub struct CaseRun {
    pub profile: ModelProfile,
    pub steps: Vec<StepRun>,
    pub duration_us: u64,
}

impl CaseRun {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.steps.iter().all(|step| step.passed)
    }

    /// One line per step, using each step's expected text.
    #[must_use]
    pub fn expected_text(&self) -> String {
        self.render(|step| &step.expected)
    }

    /// One line per step, using each step's observed text.
    #[must_use]
    pub fn actual_text(&self) -> String {
        self.render(|step| &step.actual)
    }

    fn render(&self, text: impl Fn(&StepRun) -> &str) -> String {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {}: {}", i + 1, step.label, text(step)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Runs a fixture set and collects verification results.
pub struct TestRunner {
    /// Name of the test campaign.
    pub campaign: String,
    /// Model profile under test.
    pub profile: ModelProfile,
}

impl TestRunner {
    /// Create a new test runner.
    #[must_use]
    pub fn new(campaign: impl Into<String>, profile: ModelProfile) -> Self {
        Self {
            campaign: campaign.into(),
            profile,
        }
    }

    /// Run all fixtures in a set and return results.
    pub fn run(&self, fixture_set: &FixtureSet) -> Vec<VerificationResult> {
        self.selected(fixture_set)
            .map(|case| self.verify(case, &execute_case(case, self.profile)))
            .collect()
    }

    /// Like [`TestRunner::run`], writing one log line per step and case.
    pub fn run_logged(
        &self,
        fixture_set: &FixtureSet,
        log: &mut LogEmitter,
    ) -> std::io::Result<Vec<VerificationResult>> {
        let mut results = Vec::new();
        for case in self.selected(fixture_set) {
            let run = execute_case(case, self.profile);
            let result = self.verify(case, &run);
            for step in &run.steps {
                log.emit_entry(self.step_entry(&result.case_name, step))?;
            }
            let level = if result.passed {
                LogLevel::Info
            } else {
                LogLevel::Error
            };
            log.emit_entry(
                self.entry(level, "case_end")
                    .with_case(&result.case_name)
                    .with_outcome(Outcome::from_passed(result.passed))
                    .with_duration_us(run.duration_us)
                    .with_details(serde_json::json!({
                        "family": fixture_set.family,
                        "contract": case.contract,
                        "steps": run.steps.len(),
                    })),
            )?;
            results.push(result);
        }
        Ok(results)
    }

    fn selected<'a>(&self, set: &'a FixtureSet) -> impl Iterator<Item = &'a FixtureCase> {
        let profile = self.profile;
        set.cases
            .iter()
            .filter(move |case| case.profile.includes(profile))
    }

    fn verify(&self, case: &FixtureCase, run: &CaseRun) -> VerificationResult {
        let case_name = if case.profile == ProfileSelection::Both {
            format!("{} [{}]", case.name, self.profile.as_str())
        } else {
            case.name.clone()
        };
        let expected = run.expected_text();
        let actual = run.actual_text();
        let passed = run.passed();
        let diff = (!passed).then(|| {
            let mut out = diff::render_diff(&expected, &actual);
            for (i, step) in run.steps.iter().enumerate() {
                if !step.passed {
                    out.push_str(&format!(
                        "step {} ({}) failed: expected {}, got {}\n",
                        i + 1,
                        step.label,
                        step.expected,
                        step.actual
                    ));
                }
            }
            out
        });
        VerificationResult {
            case_name,
            contract: case.contract.clone(),
            profile: self.profile,
            passed,
            expected,
            actual,
            diff,
        }
    }

    fn entry(&self, level: LogLevel, event: &str) -> LogEntry {
        LogEntry::new("", level, event)
            .with_campaign(&self.campaign)
            .with_stream(StreamKind::Conformance)
            .with_profile(self.profile.as_str())
    }

    fn step_entry(&self, case_name: &str, step: &StepRun) -> LogEntry {
        let level = if step.passed {
            LogLevel::Debug
        } else {
            LogLevel::Error
        };
        let mut details = serde_json::json!({
            "label": step.label,
            "expected": step.expected,
            "actual": step.actual,
            "diagnostics": step.diagnostics,
        });
        let mut entry = self
            .entry(level, "step")
            .with_case(case_name)
            .with_outcome(Outcome::from_passed(step.passed));
        if let Some(probe) = step.probe {
            entry = entry.with_probe(probe.as_str());
        }
        if let Some(value_type) = step.value_type {
            entry = entry.with_value_type(value_type.name());
        }
        if let Some(fault) = &step.fault {
            if let Some(symbol) = fault.symbol {
                entry = entry.with_symbol(symbol.symbol());
            }
            if let Some(status) = fault.status {
                entry = entry.with_status(status.c_name());
            }
            details["fault"] = serde_json::Value::String(fault.message.clone());
        }
        entry.with_details(details)
    }
}

/// What a probe call left behind once the managed caller resumes.
enum Observed {
    Returned { value: Handle, pending: Option<Handle> },
    Success { pending: Option<Handle> },
    Threw { exception: Option<Handle> },
}

/// Run every step of `case` under `profile`.
#[must_use]
pub fn execute_case(case: &FixtureCase, profile: ModelProfile) -> CaseRun {
    let started = Instant::now();
    let mut env = ModelEnv::new(ModelConfig::with_profile(profile));
    let mut ctx = ProbeContext::new();

    let mut bindings = Bindings::new();
    for binding in &case.bindings {
        let handle = materialize(&mut env, &bindings, &binding.value);
        env.root(handle);
        bindings.insert(binding.name.clone(), handle);
    }

    let steps = case
        .steps
        .iter()
        .map(|step| run_step(&mut env, &mut ctx, &bindings, step))
        .collect();

    CaseRun {
        profile,
        steps,
        duration_us: u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
    }
}

fn run_step(
    env: &mut ModelEnv,
    ctx: &mut ProbeContext,
    bindings: &Bindings,
    step: &Step,
) -> StepRun {
    match step {
        Step::Call {
            probe,
            args,
            expect,
        } => {
            let Some(name) = ProbeName::parse(probe) else {
                return StepRun::plain(
                    probe.clone(),
                    expect.to_string(),
                    "unknown probe".to_string(),
                    false,
                );
            };
            run_call(env, ctx, bindings, name, args, expect)
        }
        Step::CollectGarbage { expect_finalized } => {
            let fatal_before = env.fatal_errors().len();
            let stats = env.collect_garbage();
            let fatal: Vec<String> = env.fatal_errors()[fatal_before..]
                .iter()
                .map(|err| format!("fatal: {err}"))
                .collect();
            let mut actual = format!("finalized {}", stats.finalized);
            for line in &fatal {
                actual.push_str("; ");
                actual.push_str(line);
            }
            StepRun::plain(
                "collect_garbage",
                expect_finalized
                    .map_or_else(|| "finalized any".to_string(), |n| format!("finalized {n}")),
                actual,
                fatal.is_empty() && expect_finalized.is_none_or(|n| n == stats.finalized),
            )
        }
        Step::ResetLatch => {
            ctx.reset();
            StepRun::plain("reset_latch", "reset".to_string(), "reset".to_string(), true)
        }
    }
}

fn run_call(
    env: &mut ModelEnv,
    ctx: &mut ProbeContext,
    bindings: &Bindings,
    probe: ProbeName,
    args: &[JsShape],
    expect: &Expectation,
) -> StepRun {
    let (label, completion, fault, balanced) = env.with_call_scope(|env| {
        let handles: Vec<Handle> = args
            .iter()
            .map(|shape| materialize(env, bindings, shape))
            .collect();
        let label = format!(
            "{probe}({})",
            handles
                .iter()
                .map(|handle| env.describe(*handle))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let scopes = env.open_scope_count();
        let (completion, fault) = match dispatch(ctx, env, probe, &handles) {
            Ok(completion) => (completion, None),
            Err(err) => {
                raise(env, probe, &err);
                (Completion::Throw, Some(StepFault::from(&err)))
            }
        };
        (label, completion, fault, env.open_scope_count() == scopes)
    });

    let pending = env.take_exception();
    let observed = match completion {
        Completion::Return(value) => Observed::Returned { value, pending },
        Completion::Success => Observed::Success { pending },
        Completion::Throw => Observed::Threw { exception: pending },
    };

    let mut actual = render_observed(env, &observed);
    if !balanced {
        actual.push_str(" [unbalanced handle scopes]");
    }
    let diagnostics = ctx.drain_diagnostics();
    StepRun {
        label,
        expected: expect.to_string(),
        passed: balanced && satisfies(env, bindings, expect, &observed),
        actual,
        diagnostics: diagnostics.iter().map(ToString::to_string).collect(),
        probe: Some(probe),
        value_type: diagnostics.last().map(|diagnostic| diagnostic.value_type),
        fault,
    }
}

fn satisfies(env: &ModelEnv, bindings: &Bindings, expect: &Expectation, observed: &Observed) -> bool {
    match (expect, observed) {
        (
            Expectation::Returns { value },
            Observed::Returned {
                value: handle,
                pending: None,
            },
        ) => matches(env, bindings, value, *handle),
        (Expectation::Success { pending: None }, Observed::Success { pending: None }) => true,
        (
            Expectation::Success {
                pending: Some(matcher),
            },
            Observed::Success {
                pending: Some(handle),
            },
        )
        | (
            Expectation::Throws { error: matcher },
            Observed::Threw {
                exception: Some(handle),
            },
        ) => matches(env, bindings, matcher, *handle),
        _ => false,
    }
}

fn render_observed(env: &ModelEnv, observed: &Observed) -> String {
    match observed {
        Observed::Returned { value, pending } => {
            let mut out = format!("returns {}", render_value(env, *value));
            if let Some(pending) = pending {
                out.push_str(&format!(" (pending {})", render_value(env, *pending)));
            }
            out
        }
        Observed::Success { pending: None } => "success".to_string(),
        Observed::Success {
            pending: Some(pending),
        } => format!("success (pending {})", render_value(env, *pending)),
        Observed::Threw {
            exception: Some(exception),
        } => format!("throws {}", render_value(env, *exception)),
        Observed::Threw { exception: None } => "throws <nothing pending>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Matcher;

    const FIXTURE: &str = r#"{
        "version": "v1",
        "family": "mixed",
        "captured_at": "2026-10-19T00:00:00Z",
        "cases": [
            {
                "name": "finalizer_latch",
                "contract": "4.1 finalizer",
                "steps": [
                    {"op": "call", "probe": "create_ref_with_finalizer",
                     "args": [{"type": "bool", "value": true}],
                     "expect": {"outcome": "success"}},
                    {"op": "collect_garbage", "expect_finalized": 1},
                    {"op": "call", "probe": "was_finalize_called",
                     "expect": {"outcome": "returns", "value": {"match": "equals", "value": true}}}
                ]
            },
            {
                "name": "node_only_read",
                "contract": "4.4 perform_get",
                "profile": "node",
                "bindings": [
                    {"name": "obj", "value": {"type": "object", "properties": {"a": {"type": "string", "value": "x"}}}}
                ],
                "steps": [
                    {"op": "call", "probe": "perform_get",
                     "args": [{"type": "binding", "name": "obj"}, {"type": "string", "value": "a"}],
                     "expect": {"outcome": "returns", "value": {"match": "equals", "value": "x"}}}
                ]
            }
        ]
    }"#;

    #[test]
    fn both_profile_cases_are_suffixed() {
        let set = FixtureSet::from_json(FIXTURE).expect("valid fixture json");
        let node = TestRunner::new("smoke", ModelProfile::Node).run(&set);
        assert_eq!(node.len(), 2);
        assert_eq!(node[0].case_name, "finalizer_latch [node]");
        assert_eq!(node[1].case_name, "node_only_read");
        assert!(node.iter().all(|r| r.passed), "{node:#?}");

        let bun = TestRunner::new("smoke", ModelProfile::Bun).run(&set);
        assert_eq!(bun.len(), 1);
        assert_eq!(bun[0].case_name, "finalizer_latch [bun]");
        assert!(bun[0].passed);
    }

    #[test]
    fn mismatch_produces_diff() {
        let mut set = FixtureSet::from_json(FIXTURE).expect("valid fixture json");
        set.cases[0].steps[1] = Step::CollectGarbage {
            expect_finalized: Some(2),
        };
        let results = TestRunner::new("smoke", ModelProfile::Node).run(&set);
        let failed = &results[0];
        assert!(!failed.passed);
        let diff = failed.diff.as_deref().expect("diff for failing case");
        assert!(diff.contains("-2. collect_garbage: finalized 2"));
        assert!(diff.contains("+2. collect_garbage: finalized 1"));
    }

    #[test]
    fn pending_exception_is_reported_separately_from_a_throw() {
        let case = FixtureCase {
            name: "getter".into(),
            contract: "4.4 perform_get".into(),
            profile: ProfileSelection::Both,
            bindings: vec![],
            steps: vec![Step::Call {
                probe: "perform_get".into(),
                args: vec![
                    JsShape::Object {
                        properties: Default::default(),
                        throwing_getters: [("g".to_string(), JsShape::Number { value: 7.0 })]
                            .into_iter()
                            .collect(),
                    },
                    JsShape::String { value: "g".into() },
                ],
                expect: Expectation::Throws {
                    error: Matcher::Any,
                },
            }],
        };
        let run = execute_case(&case, ModelProfile::Node);
        assert!(!run.passed());
        assert_eq!(run.steps[0].actual, "success (pending 7)");
        assert_eq!(run.steps[0].label, r#"perform_get({g}, "g")"#);
    }

    #[test]
    fn step_entries_carry_value_type_and_fault_status() {
        let case = FixtureCase {
            name: "typed".into(),
            contract: "4.2 Exception capture".into(),
            profile: ProfileSelection::Node,
            bindings: vec![],
            steps: vec![
                Step::Call {
                    probe: "call_and_get_exception".into(),
                    args: vec![JsShape::Thrower {
                        throws: Box::new(JsShape::String { value: "x".into() }),
                    }],
                    expect: Expectation::Returns {
                        value: Matcher::Any,
                    },
                },
                Step::Call {
                    probe: "call_and_get_exception".into(),
                    args: vec![JsShape::Returner {
                        returns: Box::new(JsShape::Number { value: 1.0 }),
                    }],
                    expect: Expectation::Throws {
                        error: Matcher::Any,
                    },
                },
            ],
        };
        let run = execute_case(&case, ModelProfile::Node);
        assert!(run.passed(), "{run:#?}");
        assert_eq!(run.steps[0].value_type, Some(ValueType::String));
        assert_eq!(run.steps[0].fault, None);
        let fault = run.steps[1].fault.as_ref().expect("callback returned");
        assert_eq!(fault.symbol, Some(AbiCall::CallFunction));
        assert_eq!(fault.status, Some(Status::Ok));

        let set = FixtureSet {
            version: "v1".into(),
            family: "exception".into(),
            captured_at: "2026-10-19T00:00:00Z".into(),
            cases: vec![case],
        };
        let mut log = LogEmitter::to_buffer("verify", "run-2");
        TestRunner::new("verify", ModelProfile::Node)
            .run_logged(&set, &mut log)
            .expect("buffer writes succeed");
        let lines = log.buffered_lines();
        let entries: Vec<LogEntry> = lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                crate::structured_log::validate_log_line(line, i + 1).expect("valid line")
            })
            .collect();
        assert_eq!(entries[0].value_type.as_deref(), Some("string"));
        assert_eq!(entries[0].status, None);
        assert_eq!(entries[1].symbol.as_deref(), Some("napi_call_function"));
        assert_eq!(entries[1].status.as_deref(), Some("napi_ok"));
        let details = entries[1].details.as_ref().expect("details");
        assert!(
            details["fault"]
                .as_str()
                .is_some_and(|fault| fault.contains("expected napi_pending_exception"))
        );
    }

    #[test]
    fn logged_run_writes_steps_and_case_end() {
        let set = FixtureSet::from_json(FIXTURE).expect("valid fixture json");
        let mut log = LogEmitter::to_buffer("verify", "run-1");
        let results = TestRunner::new("verify", ModelProfile::Node)
            .run_logged(&set, &mut log)
            .expect("buffer writes succeed");
        assert_eq!(results.len(), 2);
        let lines = log.buffered_lines();
        assert_eq!(lines.len(), 3 + 1 + 1 + 1);
        for (i, line) in lines.iter().enumerate() {
            let entry = crate::structured_log::validate_log_line(line, i + 1).expect("valid line");
            assert_eq!(entry.profile.as_deref(), Some("node"));
        }
        assert!(lines.last().expect("lines").contains("\"event\":\"case_end\""));
    }
}
