use std::path::{Path, PathBuf};
use std::process::Command;

/// Get the workspace root (two levels up from CARGO_MANIFEST_DIR of dtdl-context-cli)
fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent() // crates/
        .unwrap()
        .parent() // workspace root
        .unwrap()
        .to_path_buf()
}

fn dtdl_context_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_dtdl-context"));
    cmd.current_dir(workspace_root());
    cmd.env_remove("RUST_LOG");
    cmd
}

fn run_json(args: &[&str]) -> (bool, serde_json::Value) {
    let output = dtdl_context_bin().args(args).output().expect("failed to run");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let value = serde_json::from_str(&stdout).expect("invalid JSON output");
    (output.status.success(), value)
}

#[test]
fn cli_help() {
    let output = dtdl_context_bin().arg("--help").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("DTDL context resolver"));
}

#[test]
fn cli_version() {
    let output = dtdl_context_bin()
        .arg("--version")
        .output()
        .expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn cli_resolve_single_file() {
    let output = dtdl_context_bin()
        .args(["resolve", "samples/01-thermostat.json"])
        .output()
        .expect("failed to run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("model dtmi:com:example:Thermostat;1 (DTDL v3)"),
        "stdout: {stdout}"
    );
    assert!(stdout.contains("types: Interface"), "stdout: {stdout}");
    assert!(
        stdout.contains("affiliates: dtmi:dtdl:extension:quantitativeTypes;1"),
        "stdout: {stdout}"
    );
    assert!(stdout.contains("1 element resolved, 0 errors in 1 document."));
}

#[test]
fn cli_resolve_json_format() {
    let (success, result) = run_json(&["resolve", "samples/01-thermostat.json", "--format", "json"]);
    assert!(success);

    let element = &result["elements"][0];
    assert_eq!(element["kind"], "model");
    assert_eq!(element["dtdlVersion"], 3);
    assert_eq!(element["types"][0], "dtmi:dtdl:class:Interface;3");
    assert_eq!(
        element["scope"]["terms"]["Thermostat"],
        "dtmi:com:example:Thermostat;1"
    );
    assert_eq!(element["scope"]["prefixes"]["acme"], "https://example.com/acme/");
    assert_eq!(result["summary"]["errors"], 0);
    assert_eq!(result["summary"]["documents"], 1);
}

#[test]
fn cli_resolve_reports_errors() {
    let output = dtdl_context_bin()
        .args(["resolve", "samples/02-invalid-context.json"])
        .output()
        .expect("failed to run");
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("error[missingContextVersion]"), "stdout: {stdout}");
    assert!(stdout.contains("error[localContextNotLast]"), "stdout: {stdout}");
    assert!(stdout.contains("0 elements resolved, 2 errors in 1 document."));
}

#[test]
fn cli_resolve_errors_json() {
    let (success, result) = run_json(&["resolve", "samples/02-invalid-context.json", "--format", "json"]);
    assert!(!success);

    let errors = result["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0]["validationId"], "missingContextVersion");
    assert_eq!(errors[0]["attributes"]["contextSpecifier"], "dtmi:dtdl:context");
    assert_eq!(errors[0]["document"], "samples/02-invalid-context.json");
    assert_eq!(errors[1]["validationId"], "localContextNotLast");
}

#[test]
fn cli_resolve_project_with_config() {
    let (success, result) = run_json(&["resolve", "samples/project", "--format", "json"]);
    assert!(success, "result: {result}");

    let elements = result["elements"].as_array().unwrap();
    assert_eq!(elements.len(), 2);

    // Extension definitions are listed first in the config sources
    assert_eq!(elements[0]["kind"], "extensionContext");
    assert_eq!(elements[0]["id"], "dtmi:com:acme:extension:sensors;1");
    assert_eq!(
        elements[0]["scope"]["prefixes"]["acmeDocs"],
        "https://docs.acme.example/sensors/"
    );

    assert_eq!(elements[1]["kind"], "model");
    assert_eq!(elements[1]["affiliates"][0], "dtmi:com:acme:extension:sensors;1");
    assert_eq!(
        elements[1]["types"][1],
        "dtmi:com:acme:extension:sensors:Calibrated"
    );
}

#[test]
fn cli_max_dtdl_version_flag() {
    let (success, result) = run_json(&[
        "resolve",
        "samples/01-thermostat.json",
        "--format",
        "json",
        "--max-dtdl-version",
        "2",
    ]);
    assert!(!success);
    assert_eq!(result["errors"][0]["validationId"], "disallowedContextVersion");
    assert_eq!(result["errors"][0]["attributes"]["maxVersion"], "2");
}

#[test]
fn cli_undefined_extension_is_an_error_unless_allowed() {
    // The model alone references an extension nobody defined
    let (success, result) = run_json(&["resolve", "samples/project/models/sensor.json", "--format", "json"]);
    assert!(!success);
    assert_eq!(
        result["errors"][0]["validationId"],
        "unresolvableContextSpecifier"
    );

    let (success, result) = run_json(&[
        "resolve",
        "samples/project/models/sensor.json",
        "--format",
        "json",
        "--allow-undefined-extensions",
    ]);
    assert!(success, "result: {result}");
    assert_eq!(result["elements"][0]["affiliates"].as_array().unwrap().len(), 0);
}

#[test]
fn cli_resolve_nonexistent() {
    let output = dtdl_context_bin()
        .args(["resolve", "samples/does-not-exist.json"])
        .output()
        .expect("failed to run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Path does not exist"), "stderr: {stderr}");
}

#[test]
fn cli_terms_default_is_latest_dtdl() {
    let output = dtdl_context_bin()
        .arg("terms")
        .output()
        .expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("dtmi:dtdl:context;4"), "stdout: {stdout}");
    assert!(stdout.contains("Interface -> dtmi:dtdl:class:Interface;4"));
    assert!(stdout.contains("dtdl: -> dtmi:dtdl:"));
}

#[test]
fn cli_terms_extension_version() {
    let output = dtdl_context_bin()
        .args(["terms", "--extension", "mqtt", "--version", "1"])
        .output()
        .expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("dtmi:dtdl:extension:mqtt;1"), "stdout: {stdout}");
    assert!(stdout.contains("telemetryTopic"));
    assert!(!stdout.contains("ttl"));
}

#[test]
fn cli_terms_unknown_version() {
    let output = dtdl_context_bin()
        .args(["terms", "--version", "9"])
        .output()
        .expect("failed to run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("available versions are"), "stderr: {stderr}");
}
