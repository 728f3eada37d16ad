use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn init_writes_database_and_admin_token() {
    let dir = tempfile::TempDir::new().expect("create temp dir");

    let mut cmd = Command::cargo_bin("arbor").expect("find binary");
    cmd.args(["admin", "init", "--data-dir"]).arg(dir.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Admin token"));

    assert!(dir.path().join("arbor.db").exists());
    let token = std::fs::read_to_string(dir.path().join(".admin_token")).expect("token file");
    assert!(token.trim().starts_with("arbor_"));
}

#[test]
fn init_refuses_to_run_twice() {
    let dir = tempfile::TempDir::new().expect("create temp dir");

    Command::cargo_bin("arbor")
        .expect("find binary")
        .args(["admin", "init", "--data-dir"])
        .arg(dir.path())
        .assert()
        .success();

    Command::cargo_bin("arbor")
        .expect("find binary")
        .args(["admin", "init", "--data-dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn serve_requires_init() {
    let dir = tempfile::TempDir::new().expect("create temp dir");

    Command::cargo_bin("arbor")
        .expect("find binary")
        .args(["serve", "--data-dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}
