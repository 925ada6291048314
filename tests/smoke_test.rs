//! Smoke tests for the Thermogate CLI.
//!
//! These tests verify basic CLI functionality:
//! - `thermogate --version` outputs version info
//! - `thermogate --help` outputs help text
//! - a missing subcommand is a usage error

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a Command for the thermogate binary.
fn tg() -> Command {
    Command::new(env!("CARGO_BIN_EXE_thermogate"))
}

#[test]
fn test_version_flag() {
    tg().arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("thermogate"))
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_help_flag() {
    tg().arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_serve_help_lists_gateway_options() {
    tg().args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--gateway-url"))
        .stdout(predicate::str::contains("--simulate"))
        .stdout(predicate::str::contains("--identity-header"));
}

#[test]
fn test_no_subcommand_is_usage_error() {
    tg().assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
