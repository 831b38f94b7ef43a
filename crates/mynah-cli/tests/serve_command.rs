use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

#[allow(deprecated)]
fn get_mynah_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("mynah")
}

#[test]
fn test_top_level_help_lists_subcommands() {
    let mut cmd = Command::new(get_mynah_bin());
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("record"))
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn test_serve_command_help() {
    let mut cmd = Command::new(get_mynah_bin());
    cmd.arg("serve").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("dispatch endpoint"))
        .stdout(predicate::str::contains("--port"));
}

#[test]
fn test_serve_rejects_bad_port() {
    let mut cmd = Command::new(get_mynah_bin());
    cmd.arg("serve").arg("--port").arg("not-a-port");

    cmd.assert().failure();
}
