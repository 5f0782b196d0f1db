//! Tests for error reporting, exit codes and top-level flags.

use predicates::prelude::*;

use crate::support::*;

#[test]
fn test_help_and_version() {
    let t = Test::new();
    t.cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("vault"));
    t.cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_usage_errors_exit_2() {
    let t = Test::new();
    t.cmd().arg("unknown-command").assert().code(2);
    t.cmd()
        .args(["vault", "history", "K", "--limit", "-1"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_identity_exit_5() {
    let t = Test::new();
    let output = t.get("demo", "API_TOKEN");
    assert_exit(&output, 5);
    assert_stderr_contains(&output, "vault identity is missing");
    assert_stderr_contains(&output, "si vault init");
}

#[test]
fn test_bad_token_is_unauthorized() {
    let t = Test::init("demo");
    let output = t
        .cmd()
        .env("SI_SUN_TOKEN", "wrong-token")
        .args(["vault", "list", "--scope", "demo"])
        .output()
        .unwrap();
    assert_exit(&output, 5);
    assert_stderr_contains(&output, "si sun auth login");
}

#[test]
fn test_unconfigured_sun_exit_5() {
    let t = Test::new();
    let output = t
        .cmd()
        .env_remove("SI_SUN_BASE_URL")
        .args(["vault", "list", "--scope", "demo"])
        .output()
        .unwrap();
    assert_exit(&output, 5);
    assert_stderr_contains(&output, "SI_SUN_BASE_URL");
}

#[test]
fn test_unreachable_sun_exit_5() {
    let t = Test::new();
    let output = t
        .cmd()
        .env("SI_SUN_BASE_URL", "http://127.0.0.1:9")
        .args(["vault", "list", "--scope", "demo"])
        .output()
        .unwrap();
    assert_exit(&output, 5);
}

#[test]
fn test_invalid_scope_exit_2() {
    let t = Test::init("demo");
    let output = t.list("bad scope!");
    assert_exit(&output, 2);
    assert_stderr_contains(&output, "invalid scope");
}

#[test]
fn test_json_error_record() {
    let t = Test::init("demo");
    let output = t.vault(&["get", "NOPE", "--scope", "demo", "--json"]);
    assert_exit(&output, 3);
    let body = json(&output);
    assert_eq!(body["error"]["kind"], "not_found");
    assert_eq!(body["error"]["exit_code"], 3);
    assert!(body["error"]["message"].as_str().unwrap().contains("NOPE"));
}

#[test]
fn test_verbose_logs_to_stderr_only() {
    let t = Test::with_values("demo", &[("A", "one")]);
    let output = t
        .cmd()
        .args(["--verbose", "vault", "get", "A", "--scope", "demo", "--reveal"])
        .output()
        .unwrap();
    assert_success(&output);
    assert_eq!(stdout(&output), "one\n");
    assert_stderr_contains(&output, "DEBUG");
}

#[test]
fn test_deprecated_file_flag_selects_scope() {
    let t = Test::init("prod");
    let output = t.vault(&["set", "A", "one", "--file", ".env.prod"]);
    assert_success(&output);
    assert_stderr_contains(&output, "deprecated");
    assert_eq!(stdout(&t.reveal("prod", "A")), "one\n");
}

#[test]
fn test_completions() {
    let t = Test::new();
    t.cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("si"));
}
