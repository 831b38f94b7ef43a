use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

#[allow(deprecated)]
fn get_mynah_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("mynah")
}

#[test]
fn test_record_command_help() {
    let mut cmd = Command::new(get_mynah_bin());
    cmd.arg("record").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Join a meeting room"))
        .stdout(predicate::str::contains("--output-dir"))
        .stdout(predicate::str::contains("--base-url"))
        .stdout(predicate::str::contains("--display-name"))
        .stdout(predicate::str::contains("--audio-sink"))
        .stdout(predicate::str::contains("--chrome-path"))
        .stdout(predicate::str::contains("--ffmpeg-path"));
}

#[test]
fn test_record_requires_room_argument() {
    let mut cmd = Command::new(get_mynah_bin());
    cmd.arg("record");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("ROOM"));
}

#[test]
fn test_record_fails_fast_without_chrome() {
    // A bad --chrome-path must abort before any capture is attempted.
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = Command::new(get_mynah_bin());
    cmd.arg("record")
        .arg("standup")
        .arg("--chrome-path")
        .arg("/nonexistent/chrome")
        .arg("--output-dir")
        .arg(dir.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}
