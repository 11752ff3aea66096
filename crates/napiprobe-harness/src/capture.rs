//! Observation capture.
//!
//! Runs fixture sets under each model profile and records what every step
//! actually produced, independent of the fixture's expectation. Captures
//! from the two profiles can then be compared step by step.

use napiprobe_model::ModelProfile;
use serde::{Deserialize, Serialize};

use crate::fixtures::FixtureSet;
use crate::runner::execute_case;
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome, StreamKind};

/// One observed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedObservation {
    pub family: String,
    pub case: String,
    pub profile: ModelProfile,
    /// 1-based step index within the case.
    pub step: usize,
    pub label: String,
    /// Rendered outcome, e.g. `throws [TypeError: bad] code=E_T`.
    pub observed: String,
    /// Whether the observation satisfied the fixture's expectation.
    pub matched: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

/// A step the two profiles observed differently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDivergence {
    pub case: String,
    pub step: usize,
    pub label: String,
    pub node: String,
    pub bun: String,
}

/// Run every case of `set` selected for each of `profiles`.
#[must_use]
pub fn capture_set(set: &FixtureSet, profiles: &[ModelProfile]) -> Vec<CapturedObservation> {
    let mut out = Vec::new();
    for &profile in profiles {
        for case in set.cases.iter().filter(|case| case.profile.includes(profile)) {
            let run = execute_case(case, profile);
            out.extend(run.steps.into_iter().enumerate().map(|(i, step)| {
                CapturedObservation {
                    family: set.family.clone(),
                    case: case.name.clone(),
                    profile,
                    step: i + 1,
                    label: step.label,
                    observed: step.actual,
                    matched: step.passed,
                    diagnostics: step.diagnostics,
                }
            }));
        }
    }
    out
}

/// Steps captured under both profiles whose outcomes differ.
#[must_use]
pub fn profile_divergences(observations: &[CapturedObservation]) -> Vec<ProfileDivergence> {
    observations
        .iter()
        .filter(|node| node.profile == ModelProfile::Node)
        .filter_map(|node| {
            let bun = observations.iter().find(|bun| {
                bun.profile == ModelProfile::Bun
                    && bun.family == node.family
                    && bun.case == node.case
                    && bun.step == node.step
            })?;
            (bun.observed != node.observed).then(|| ProfileDivergence {
                case: node.case.clone(),
                step: node.step,
                label: node.label.clone(),
                node: node.observed.clone(),
                bun: bun.observed.clone(),
            })
        })
        .collect()
}

/// Write one capture-stream entry per observation and one per divergence.
///
/// Observations that miss their fixture expectation are warnings: capture
/// records behaviour, it does not judge it.
pub fn log_observations(
    observations: &[CapturedObservation],
    divergences: &[ProfileDivergence],
    log: &mut LogEmitter,
) -> std::io::Result<()> {
    for observation in observations {
        let level = if observation.matched {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        };
        log.emit_entry(
            LogEntry::new("", level, "observation")
                .with_stream(StreamKind::Capture)
                .with_profile(observation.profile.as_str())
                .with_case(&observation.case)
                .with_outcome(Outcome::from_passed(observation.matched))
                .with_details(serde_json::json!({
                    "family": observation.family,
                    "step": observation.step,
                    "label": observation.label,
                    "observed": observation.observed,
                    "diagnostics": observation.diagnostics,
                })),
        )?;
    }
    for divergence in divergences {
        log.emit_entry(
            LogEntry::new("", LogLevel::Warn, "profile_divergence")
                .with_stream(StreamKind::Capture)
                .with_case(&divergence.case)
                .with_details(serde_json::json!({
                    "step": divergence.step,
                    "label": divergence.label,
                    "node": divergence.node,
                    "bun": divergence.bun,
                })),
        )?;
    }
    log.flush()
}

/// Serialize captured observations as JSON.
pub fn capture_observations(observations: &[CapturedObservation]) -> String {
    serde_json::to_string_pretty(observations).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}
