use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_app_status_check_exits_cleanly() {
    Command::cargo_bin("hotswap-app")
        .unwrap()
        .arg("--test")
        .env_remove("HOTSWAP_SERVER")
        .assert()
        .success()
        .stdout(predicate::str::contains("[1] version"));
}

#[test]
fn test_app_help_lists_flags() {
    Command::cargo_bin("hotswap-app")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--server"))
        .stdout(predicate::str::contains("--poll-interval"))
        .stdout(predicate::str::contains("--self-test"));
}

#[test]
fn test_server_help_lists_flags() {
    Command::cargo_bin("hotswap-server")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--app-data"));
}

#[test]
fn test_server_fails_on_missing_data_file() {
    let temp_dir = tempfile::TempDir::new().unwrap();

    Command::cargo_bin("hotswap-server")
        .unwrap()
        .arg("--app-data")
        .arg(temp_dir.path().join("nope.json"))
        .arg("--port")
        .arg("0")
        .arg("--quiet")
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.json"));
}
