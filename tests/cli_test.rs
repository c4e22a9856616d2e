//! CLI integration tests for the structmap binary.

use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command;

/// Helper to run the CLI
fn run_cli(args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_structmap"))
        .args(args)
        .env("SOURCE_DATE_EPOCH", "1700000000")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute structmap CLI");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn run_json(args: &[&str]) -> Value {
    let mut full = args.to_vec();
    full.push("--json");
    let (stdout, stderr, success) = run_cli(&full);
    assert!(success, "{:?} should succeed: {}", args, stderr);
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("invalid JSON ({e}): {stdout}"))
}

fn copy_fixture() -> tempfile::TempDir {
    let src_root = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/basic");
    let temp = tempfile::tempdir().expect("tempdir");
    for entry in walkdir::WalkDir::new(&src_root) {
        let entry = entry.expect("walkdir entry");
        let dest = temp.path().join(entry.path().strip_prefix(&src_root).unwrap());
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).unwrap();
        } else {
            fs::copy(entry.path(), &dest).unwrap();
        }
    }
    temp
}

fn workspace(temp: &tempfile::TempDir) -> String {
    temp.path().to_string_lossy().into_owned()
}

#[test]
fn test_help_command() {
    let (stdout, _, success) = run_cli(&["--help"]);
    assert!(success, "Help command should succeed");
    assert!(stdout.contains("structmap"), "Should mention structmap");
    for command in ["index", "diff", "split", "summarize"] {
        assert!(stdout.contains(command), "Should mention {command} command");
    }
}

#[test]
fn test_version_command() {
    let (stdout, _, success) = run_cli(&["--version"]);
    assert!(success, "Version command should succeed");
    assert!(stdout.contains("0.1.0"), "Should show version");
}

#[test]
fn test_index_writes_document_and_manifest() {
    let temp = copy_fixture();
    let ws = workspace(&temp);
    let output = run_json(&["index", "--workspace", &ws]);

    assert_eq!(output["type"], "Index");
    assert_eq!(output["stats"]["module_count"], 4);
    assert_eq!(output["stats"]["call_edges_count"], 9);
    assert_eq!(output["report"]["files_scanned"], 4);
    assert!(output["changes"].is_null(), "first run has nothing to compare");

    let document: Value =
        serde_json::from_str(&fs::read_to_string(temp.path().join(".structmap/structure.json")).unwrap())
            .unwrap();
    assert_eq!(document["metadata"]["project_name"], "basic");
    let manifest: Value =
        serde_json::from_str(&fs::read_to_string(temp.path().join(".structmap/manifest.json")).unwrap())
            .unwrap();
    assert_eq!(manifest["generated_at_unix"], 1_700_000_000);
}

#[test]
fn test_index_human_output() {
    let temp = copy_fixture();
    let ws = workspace(&temp);
    let (stdout, stderr, success) = run_cli(&["index", "--workspace", &ws]);
    assert!(success, "Index command should succeed: {}", stderr);
    assert!(stdout.contains("Indexed 4 files"), "Should report indexing results: {}", stdout);
    assert!(stdout.contains("4 modules"), "{}", stdout);
}

#[test]
fn test_second_index_reports_changes() {
    let temp = copy_fixture();
    let ws = workspace(&temp);
    run_json(&["index", "--workspace", &ws]);

    let unchanged = run_json(&["index", "--workspace", &ws]);
    assert_eq!(unchanged["changes"]["added"], Value::Array(vec![]));
    assert_eq!(unchanged["changes"]["modified"], Value::Array(vec![]));

    fs::write(
        temp.path().join("web/extra.ts"),
        "export function ping(): void {\n  fetch('/ping');\n}\n",
    )
    .unwrap();
    let (stdout, stderr, success) = run_cli(&["index", "--workspace", &ws]);
    assert!(success, "{}", stderr);
    assert!(stdout.contains("2 added"), "{}", stdout);
    assert!(stdout.contains("+ web.extra.ping#function"), "{}", stdout);
}

#[test]
fn test_no_diff_skips_comparison() {
    let temp = copy_fixture();
    let ws = workspace(&temp);
    run_json(&["index", "--workspace", &ws]);
    let output = run_json(&["index", "--workspace", &ws, "--no-diff"]);
    assert!(output["changes"].is_null());
}

#[test]
fn test_diff_command() {
    let temp = copy_fixture();
    let ws = workspace(&temp);
    run_json(&["index", "--workspace", &ws]);
    let old = temp.path().join("old-manifest.json");
    fs::copy(temp.path().join(".structmap/manifest.json"), &old).unwrap();

    fs::remove_file(temp.path().join("src/billing.rs")).unwrap();
    run_json(&["index", "--workspace", &ws, "--no-diff"]);

    let old = old.to_string_lossy().into_owned();
    let new = temp.path().join(".structmap/manifest.json").to_string_lossy().into_owned();
    let output = run_json(&["diff", &old, &new]);
    assert_eq!(output["type"], "Diff");
    let deleted: Vec<&str> = output["report"]["deleted"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["uid"].as_str().unwrap())
        .collect();
    assert_eq!(
        deleted,
        vec!["billing#module", "billing.Line#class", "billing.Line.new", "billing.total#function"]
    );
}

#[test]
fn test_split_creates_struct_directory() {
    let temp = copy_fixture();
    let ws = workspace(&temp);
    run_json(&["index", "--workspace", &ws]);

    let out = temp.path().join("struct-out");
    let out_arg = out.to_string_lossy().into_owned();
    let output = run_json(&["split", "--workspace", &ws, "--out", &out_arg]);
    assert_eq!(output["type"], "Split");
    assert_eq!(output["modules"], 4);
    assert!(out.join("index.json").is_file());
    assert!(out.join("modules/billing.json").is_file());
}

#[test]
fn test_split_without_index_fails() {
    let temp = copy_fixture();
    let ws = workspace(&temp);
    let (_, stderr, success) = run_cli(&["split", "--workspace", &ws]);
    assert!(!success);
    assert!(stderr.contains("structmap index"), "{}", stderr);
}

#[test]
fn test_summarize_heuristic() {
    let temp = copy_fixture();
    let ws = workspace(&temp);
    let output = run_json(&["summarize", "get_user_name", "--workspace", &ws]);
    assert_eq!(output["type"], "Summary");
    assert_eq!(output["summary"]["source"], "heuristic");
    assert!((output["summary"]["confidence"].as_f64().unwrap() - 0.3).abs() < 1e-6);
}

#[test]
fn test_summarize_docstring() {
    let temp = copy_fixture();
    let ws = workspace(&temp);
    let output = run_json(&[
        "summarize",
        "load_user",
        "--workspace",
        &ws,
        "--doc",
        "  Load a user record by id.  ",
    ]);
    assert_eq!(output["summary"]["source"], "docstring");
    assert_eq!(output["summary"]["text"], "Load a user record by id.");
}

#[test]
fn test_missing_manifest_json_error() {
    let temp = copy_fixture();
    let missing = temp.path().join("nope.json").to_string_lossy().into_owned();
    let (stdout, stderr, success) = run_cli(&["diff", &missing, &missing, "--json"]);
    assert!(!success, "diff of missing manifests should fail");
    assert!(stdout.is_empty(), "errors never go to stdout: {}", stdout);

    let error: Value = serde_json::from_str(&stderr).unwrap_or_else(|e| panic!("{e}: {stderr}"));
    assert_eq!(error["ok"], false);
    assert_eq!(error["error"]["code"], "manifest_load");
}

#[test]
fn test_invalid_config_is_rejected() {
    let temp = copy_fixture();
    let ws = workspace(&temp);
    fs::write(temp.path().join("structmap.toml"), "[scan\nworkers = ").unwrap();
    let (_, stderr, success) = run_cli(&["index", "--workspace", &ws, "--json"]);
    assert!(!success);
    let error: Value = serde_json::from_str(&stderr).unwrap_or_else(|e| panic!("{e}: {stderr}"));
    assert_eq!(error["error"]["code"], "config");
}
