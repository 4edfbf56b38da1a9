use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*; // Used for writing assertions
use std::process::Command; // Run programs

#[test]
/// dwh-manager inspect needs a readable config
fn inspect_missing_file() {
    let mut cmd = Command::cargo_bin("dwh-manager").unwrap();
    cmd.arg("inspect")
        .arg("--file")
        .arg("/tmp/dwh-manager-inspect-not-found.yaml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config file"));
}

#[test]
fn inspect_missing_arguments() {
    let mut cmd = Command::cargo_bin("dwh-manager").unwrap();
    cmd.arg("inspect")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--file"));
}
