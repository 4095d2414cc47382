//! Integration tests for the CLI binary.
//!
//! Verifies that the `sdid` binary responds to basic flags and can run a
//! non-interactive login and certification round against a temporary home.
//!
//! This test is registered as a [[test]] in the sdid-cli crate so that
//! CARGO_BIN_EXE_sdid is available.

use std::path::Path;
use std::process::{Command, Output};

/// Get a Command pointing to the `sdid` binary.
fn sdid_binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_sdid"))
}

fn run(home: &Path, args: &[&str]) -> Output {
    sdid_binary()
        .arg("--home")
        .arg(home)
        .args(args)
        .output()
        .expect("failed to execute sdid")
}

fn assert_ok(output: &Output, what: &str) -> String {
    assert!(
        output.status.success(),
        "{what} should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn cli_responds_to_help() {
    let output = sdid_binary()
        .arg("--help")
        .output()
        .expect("failed to execute sdid --help");
    let stdout = assert_ok(&output, "sdid --help");
    assert!(
        stdout.contains("sdid") || stdout.contains("Usage"),
        "sdid --help output should contain usage information, got: {stdout}"
    );
}

#[test]
fn cli_responds_to_version() {
    let output = sdid_binary()
        .arg("--version")
        .output()
        .expect("failed to execute sdid --version");
    let stdout = assert_ok(&output, "sdid --version");
    assert!(
        stdout.contains("0.1") || stdout.contains("sdid"),
        "sdid --version should contain version info, got: {stdout}"
    );
}

#[test]
fn cli_exits_with_error_on_unknown_flag() {
    let output = sdid_binary()
        .arg("--nonexistent-flag")
        .output()
        .expect("failed to execute sdid");
    assert!(!output.status.success());
}

#[test]
fn cli_login_without_identities_fails() {
    let home = tempfile::tempdir().unwrap();
    let output = run(home.path(), &["login", "--yes", "--origin", "https://x.example"]);
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("NO_IDENTITIES"), "got: {stdout}");
}

#[test]
fn cli_login_verify_and_certify() {
    let home = tempfile::tempdir().unwrap();
    let home = home.path();

    assert_ok(&run(home, &["init", "--label", "alice"]), "init alice");
    assert_ok(
        &run(home, &["init", "--label", "root", "--roles", "admin"]),
        "init root",
    );
    let listed = assert_ok(&run(home, &["list"]), "list");
    assert!(listed.contains("alice") && listed.contains("root"));

    // Login as alice and remember the origin.
    let response = assert_ok(
        &run(
            home,
            &[
                "login",
                "--yes",
                "--remember",
                "true",
                "--identity",
                "alice",
                "--origin",
                "https://x.example",
            ],
        ),
        "login",
    );
    let response_path = home.join("response.json");
    std::fs::write(&response_path, &response).unwrap();

    let grants = assert_ok(&run(home, &["grants"]), "grants");
    assert!(grants.contains("https://x.example"));

    let verified = assert_ok(
        &run(home, &["verify", response_path.to_str().unwrap()]),
        "verify",
    );
    assert!(verified.contains("success"), "got: {verified}");
    assert!(verified.contains("missing"), "got: {verified}");

    // Certify alice with root.
    let submitted = assert_ok(&run(home, &["certify", "submit", "alice"]), "submit");
    let request_id = submitted
        .split_whitespace()
        .find(|w| w.starts_with("approval-"))
        .expect("request id in output")
        .to_string();
    assert_ok(
        &run(
            home,
            &["certify", "approve", &request_id, "--admin", "root", "--yes"],
        ),
        "approve",
    );

    let status = assert_ok(&run(home, &["certify", "status", "alice"]), "status");
    assert!(status.contains("approved"), "got: {status}");

    let verified = assert_ok(
        &run(home, &["verify", response_path.to_str().unwrap()]),
        "verify after approval",
    );
    assert!(verified.contains("Authorized:    yes"), "got: {verified}");

    assert_ok(
        &run(home, &["revoke", "alice", "https://x.example"]),
        "revoke",
    );
    let grants = assert_ok(&run(home, &["grants"]), "grants after revoke");
    assert!(grants.contains("No remembered origins"));
}

#[test]
fn cli_export_import_delete() {
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();

    assert_ok(&run(source.path(), &["init", "--label", "alice"]), "init alice");
    assert_ok(
        &run(source.path(), &["init", "--label", "root", "--roles", "admin"]),
        "init root",
    );

    let bundle_path = source.path().join("bundle.json");
    assert_ok(
        &run(source.path(), &["export", bundle_path.to_str().unwrap()]),
        "export",
    );
    let bundle: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&bundle_path).unwrap()).unwrap();
    assert_eq!(bundle["version"], 1);
    assert_eq!(bundle["identities"].as_array().unwrap().len(), 2);

    let imported = assert_ok(
        &run(target.path(), &["import", bundle_path.to_str().unwrap()]),
        "import",
    );
    assert!(imported.contains("2 added"), "got: {imported}");
    let again = assert_ok(
        &run(target.path(), &["import", bundle_path.to_str().unwrap()]),
        "import again",
    );
    assert!(again.contains("0 added, 2 replaced"), "got: {again}");

    // imported keys still sign
    assert_ok(
        &run(
            target.path(),
            &["login", "--yes", "--identity", "root", "--origin", "https://x.example"],
        ),
        "login with imported identity",
    );

    assert_ok(&run(target.path(), &["delete", "alice"]), "delete");
    let listed = assert_ok(&run(target.path(), &["list"]), "list");
    assert!(!listed.contains("alice") && listed.contains("root"), "got: {listed}");

    assert!(!run(target.path(), &["clear"]).status.success());
    assert_ok(&run(target.path(), &["clear", "--yes"]), "clear");
    let listed = assert_ok(&run(target.path(), &["list"]), "list after clear");
    assert!(listed.contains("No identities found"), "got: {listed}");
}
