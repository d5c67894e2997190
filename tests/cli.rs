use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn unknown_subcommand_fails_with_usage_hint() {
    Command::cargo_bin("pvsync")
        .unwrap()
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Subcommand must be one of"));
}

#[test]
fn missing_subcommand_fails() {
    Command::cargo_bin("pvsync").unwrap().assert().failure();
}
