//! CLI entrypoint for the napiprobe conformance harness.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use napiprobe_core::ProbeName;
use napiprobe_harness::capture::{
    capture_observations, capture_set, log_observations, profile_divergences,
};
use napiprobe_harness::fixtures::load_dir;
use napiprobe_harness::structured_log::{
    ArtifactIndex, LogEmitter, LogEntry, LogLevel, Outcome, StreamKind, now_utc,
    validate_log_file,
};
use napiprobe_harness::traceability::TraceabilityMatrix;
use napiprobe_harness::{
    ConformanceReport, FixtureSet, HarnessError, ProfileSelection, TestRunner, VerificationSummary,
};
use napiprobe_model::ModelProfile;

/// Conformance tooling for the Node-API edge-case probes.
#[derive(Debug, Parser)]
#[command(name = "napiprobe-harness")]
#[command(about = "Conformance testing harness for the napiprobe probes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Verify the probes against fixtures on the model environment.
    Verify {
        /// Directory containing fixture JSON files.
        #[arg(long, default_value = "tests/conformance/fixtures")]
        fixture: PathBuf,
        /// Profile to run (`node`, `bun` or `both`). Falls back to
        /// `NAPIPROBE_PROFILE`, then `both`.
        #[arg(long)]
        profile: Option<String>,
        /// Output report path (markdown). A JSON twin is written next to it.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Structured JSONL log path.
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Record observed outcomes of every fixture step as JSON.
    Capture {
        #[arg(long, default_value = "tests/conformance/fixtures")]
        fixture: PathBuf,
        #[arg(long)]
        profile: Option<String>,
        /// Output JSON path.
        #[arg(long)]
        output: PathBuf,
        /// Structured JSONL log path.
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Generate the probe traceability matrix.
    Traceability {
        #[arg(long, default_value = "tests/conformance/fixtures")]
        fixture: PathBuf,
        /// Output markdown path.
        #[arg(long)]
        output_md: PathBuf,
        /// Output JSON path.
        #[arg(long)]
        output_json: PathBuf,
    },
    /// List exported probes with their signatures and ABI symbols.
    List,
    /// Validate a structured JSONL log file.
    ValidateLog {
        #[arg(long)]
        path: PathBuf,
    },
}

fn resolve_profiles(flag: Option<&str>) -> Result<Vec<ModelProfile>, HarnessError> {
    let raw = match flag {
        Some(raw) => Some(raw.to_string()),
        None => std::env::var("NAPIPROBE_PROFILE").ok(),
    };
    let selection = match raw {
        Some(raw) => ProfileSelection::from_str_loose(&raw)
            .ok_or_else(|| HarnessError::UnknownProfile(raw))?,
        None => ProfileSelection::Both,
    };
    Ok(selection.profiles())
}

fn load_sets(dir: &Path) -> Result<Vec<FixtureSet>, HarnessError> {
    Ok(load_dir(dir)?.into_iter().map(|(_, set)| set).collect())
}

fn write(path: &Path, contents: &str) -> Result<(), HarnessError> {
    std::fs::write(path, contents).map_err(|err| HarnessError::io(path, err))
}

fn run_id() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("run-{secs}-{}", std::process::id())
}

fn verify(
    fixture: &Path,
    profile: Option<&str>,
    report: Option<&Path>,
    log: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Verifying against fixtures in {}", fixture.display());
    let profiles = resolve_profiles(profile)?;
    let sets = load_sets(fixture)?;
    let run_id = run_id();

    let mut emitter = match log {
        Some(path) => Some(
            LogEmitter::to_file(path, "verify", &run_id).map_err(|err| HarnessError::io(path, err))?,
        ),
        None => None,
    };

    let mut results = Vec::new();
    for &profile in &profiles {
        let runner = TestRunner::new("verify", profile);
        for set in &sets {
            match emitter.as_mut() {
                Some(emitter) => results.extend(runner.run_logged(set, emitter)?),
                None => results.extend(runner.run(set)),
            }
        }
    }

    let summary = VerificationSummary::from_results(results);
    let report_doc = ConformanceReport {
        title: String::from("napiprobe Conformance Report"),
        profiles: profiles.iter().map(|p| p.as_str().to_string()).collect(),
        timestamp: now_utc(),
        summary,
    };

    eprintln!(
        "Verification complete: total={}, passed={}, failed={}",
        report_doc.summary.total, report_doc.summary.passed, report_doc.summary.failed
    );
    for failure in report_doc.summary.failures() {
        eprintln!("FAIL {}", failure.case_name);
        if let Some(diff) = &failure.diff {
            eprintln!("{diff}");
        }
    }

    let mut index = ArtifactIndex::new(&run_id, "verify");
    if let Some(report_path) = report {
        eprintln!("Writing report to {}", report_path.display());
        write(report_path, &report_doc.to_markdown())?;
        let json_path = report_path.with_extension("json");
        write(&json_path, &report_doc.to_json())?;
        index
            .add_file(report_path, "report_markdown")
            .map_err(|err| HarnessError::io(report_path, err))?;
        index
            .add_file(&json_path, "report_json")
            .map_err(|err| HarnessError::io(&json_path, err))?;
    }

    if let Some(emitter) = emitter.as_mut() {
        let refs = index.artifacts.iter().map(|a| a.path.clone()).collect();
        let level = if report_doc.summary.all_passed() {
            LogLevel::Info
        } else {
            LogLevel::Error
        };
        emitter.emit_entry(
            LogEntry::new("", level, "run_end")
                .with_stream(StreamKind::Conformance)
                .with_outcome(Outcome::from_passed(report_doc.summary.all_passed()))
                .with_artifacts(refs)
                .with_details(serde_json::json!({
                    "total": report_doc.summary.total,
                    "passed": report_doc.summary.passed,
                    "failed": report_doc.summary.failed,
                })),
        )?;
        emitter.flush()?;
    }
    if let Some(report_path) = report {
        if let Some(log_path) = log {
            index
                .add_file(log_path, "log_jsonl")
                .map_err(|err| HarnessError::io(log_path, err))?;
        }
        let index_path = report_path.with_extension("artifacts.json");
        write(&index_path, &index.to_json()?)?;
    }

    if !report_doc.summary.all_passed() {
        return Err("Conformance verification failed".into());
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Verify {
            fixture,
            profile,
            report,
            log,
        } => verify(&fixture, profile.as_deref(), report.as_deref(), log.as_deref())?,
        Command::Capture {
            fixture,
            profile,
            output,
            log,
        } => {
            let profiles = resolve_profiles(profile.as_deref())?;
            let mut observations = Vec::new();
            for set in load_sets(&fixture)? {
                observations.extend(capture_set(&set, &profiles));
            }
            let divergences = profile_divergences(&observations);
            if let Some(path) = &log {
                let mut emitter = LogEmitter::to_file(path, "capture", &run_id())
                    .map_err(|err| HarnessError::io(path, err))?;
                log_observations(&observations, &divergences, &mut emitter)
                    .map_err(|err| HarnessError::io(path, err))?;
            }
            for divergence in &divergences {
                eprintln!(
                    "profiles diverge at {} step {} ({}): node={}, bun={}",
                    divergence.case,
                    divergence.step,
                    divergence.label,
                    divergence.node,
                    divergence.bun
                );
            }
            write(&output, &capture_observations(&observations))?;
            eprintln!(
                "Captured {} observations to {}",
                observations.len(),
                output.display()
            );
        }
        Command::Traceability {
            fixture,
            output_md,
            output_json,
        } => {
            let matrix = TraceabilityMatrix::from_fixtures(&load_sets(&fixture)?);
            write(&output_md, &matrix.to_markdown())?;
            write(&output_json, &matrix.to_json()?)?;
            for probe in matrix.uncovered() {
                eprintln!("warning: no fixture case calls {probe}");
            }
            eprintln!(
                "Traceability written to {} and {}",
                output_md.display(),
                output_json.display()
            );
        }
        Command::List => {
            for probe in ProbeName::ALL {
                let symbols: Vec<&str> = probe.abi_calls().iter().map(|call| call.symbol()).collect();
                println!("{probe}{}", probe.signature());
                println!("    uses: {}", symbols.join(", "));
            }
        }
        Command::ValidateLog { path } => {
            let (lines, errors) =
                validate_log_file(&path).map_err(|err| HarnessError::io(&path, err))?;
            for error in &errors {
                eprintln!("{error}");
            }
            eprintln!("{lines} line(s), {} error(s)", errors.len());
            if !errors.is_empty() {
                return Err("structured log validation failed".into());
            }
        }
    }
    Ok(())
}
