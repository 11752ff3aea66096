// harness_cli_test.rs
// End-to-end runs of the harness binary: verify with report + log, then
// validate the emitted artifacts.

use std::path::{Path, PathBuf};
use std::process::Command;

fn repo_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

fn out_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("napiprobe-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn load_json(path: &Path) -> serde_json::Value {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Invalid JSON in {}: {}", path.display(), e))
}

fn harness() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_harness"));
    cmd.current_dir(repo_root()).env_remove("NAPIPROBE_PROFILE");
    cmd
}

#[test]
fn verify_writes_report_log_and_artifact_index() {
    let dir = out_dir("verify");
    let report = dir.join("report.md");
    let log = dir.join("run.jsonl");
    let output = harness()
        .args(["verify", "--report"])
        .arg(&report)
        .arg("--log")
        .arg(&log)
        .output()
        .expect("failed to run harness verify");
    assert!(
        output.status.success(),
        "verify failed:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let markdown = std::fs::read_to_string(&report).expect("report written");
    assert!(markdown.contains("- Profiles: node, bun"));
    assert!(markdown.contains("- Failed: 0"));

    let json = load_json(&report.with_extension("json"));
    assert_eq!(json["summary"]["failed"], 0);

    let validated = harness()
        .args(["validate-log", "--path"])
        .arg(&log)
        .output()
        .expect("failed to run validate-log");
    assert!(
        validated.status.success(),
        "log invalid:\n{}",
        String::from_utf8_lossy(&validated.stderr)
    );

    let entries: Vec<serde_json::Value> = std::fs::read_to_string(&log)
        .expect("log written")
        .lines()
        .map(|line| serde_json::from_str(line).expect("JSONL line"))
        .collect();
    assert!(entries.iter().any(|e| e["value_type"] == "number"));
    assert!(entries.iter().any(|e| {
        e["symbol"] == "napi_call_function" && e["status"] == "napi_ok"
    }));

    let index = load_json(&report.with_extension("artifacts.json"));
    let kinds: Vec<&str> = index["artifacts"]
        .as_array()
        .expect("artifact list")
        .iter()
        .filter_map(|a| a["kind"].as_str())
        .collect();
    assert_eq!(kinds, ["report_markdown", "report_json", "log_jsonl"]);
    for artifact in index["artifacts"].as_array().unwrap() {
        assert_eq!(artifact["sha256"].as_str().map(str::len), Some(64));
    }

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn profile_flag_restricts_the_run() {
    let dir = out_dir("bun-only");
    let report = dir.join("report.md");
    let output = harness()
        .args(["verify", "--profile", "bun", "--report"])
        .arg(&report)
        .output()
        .expect("failed to run harness verify");
    assert!(output.status.success());
    let json = load_json(&report.with_extension("json"));
    assert_eq!(json["profiles"], serde_json::json!(["bun"]));
    for result in json["summary"]["results"].as_array().unwrap() {
        assert_eq!(result["profile"], "bun");
    }
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn capture_writes_observations_and_log() {
    let dir = out_dir("capture");
    let output_path = dir.join("observations.json");
    let log = dir.join("capture.jsonl");
    let output = harness()
        .args(["capture", "--output"])
        .arg(&output_path)
        .arg("--log")
        .arg(&log)
        .output()
        .expect("failed to run harness capture");
    assert!(
        output.status.success(),
        "capture failed:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let observations = load_json(&output_path);
    let count = observations.as_array().expect("observation list").len();
    assert!(count > 0);

    let lines: Vec<String> = std::fs::read_to_string(&log)
        .expect("log written")
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(lines.len(), count);
    for line in &lines {
        let entry: serde_json::Value = serde_json::from_str(line).expect("JSONL line");
        assert_eq!(entry["stream"], "capture");
        assert_eq!(entry["event"], "observation");
    }
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn unknown_profile_is_rejected() {
    let output = harness()
        .args(["verify", "--profile", "deno"])
        .output()
        .expect("failed to run harness verify");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("deno"));
}

#[test]
fn list_names_every_probe() {
    let output = harness().arg("list").output().expect("failed to run list");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["create_ref_with_finalizer", "perform_get", "check_tag"] {
        assert!(stdout.contains(name), "list output missing {name}");
    }
    assert!(stdout.contains("uses: napi_get_value_uint32, napi_create_array_with_length"));
}
