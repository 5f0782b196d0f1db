//! Tests for trust pinning and `si vault trust`.

use crate::support::*;

#[test]
fn test_identity_drift_blocks_mutations() {
    let t = Test::with_values("demo", &[("A", "one")]);
    t.sun.replace_identity();

    let output = t.set("demo", "K", "V");
    assert_exit(&output, 4);
    assert_stderr_contains(&output, "expected:");
    assert_stderr_contains(&output, "actual:");
    assert_stderr_contains(&output, "--accept-new-recipients");

    let last = t.audit().pop().unwrap();
    assert_eq!(last["op"], "set");
    assert_eq!(last["outcome"], "denied");
    assert_eq!(last["extra"]["kind"], "trust_violation");
}

#[test]
fn test_accept_new_recipients_admits_drift() {
    let t = Test::init("demo");
    t.sun.replace_identity();

    let output = t.vault(&["set", "K", "V", "--scope", "demo", "--accept-new-recipients"]);
    assert_success(&output);
    assert_success(&t.set("demo", "K2", "V2"));
    assert_eq!(stdout(&t.reveal("demo", "K")), "V\n");
}

#[test]
fn test_reads_on_drifted_scope_warn() {
    let t = Test::with_values("demo", &[("A", "one")]);
    t.sun.replace_identity();

    let output = t.list("demo");
    assert_success(&output);
    assert_stderr_contains(&output, "recipient set differs");

    let last = t.audit().pop().unwrap();
    assert_eq!(last["op"], "list");
    assert_eq!(last["extra"]["untrusted"], true);
}

#[test]
fn test_trust_status_accept_forget() {
    let t = Test::init("demo");

    let output = t.vault(&["trust", "status", "--scope", "demo", "--json"]);
    assert_success(&output);
    assert_eq!(json(&output)["state"], "ok");

    t.sun.replace_identity();
    let output = t.vault(&["trust", "status", "--scope", "demo", "--json"]);
    assert_success(&output);
    let status = json(&output);
    assert_eq!(status["state"], "mismatch");
    assert_ne!(status["stored"], status["current"]);

    let output = t.vault(&["trust", "accept", "--scope", "demo"]);
    assert_exit(&output, 2);
    assert_stderr_contains(&output, "--yes");

    assert_success(&t.vault(&["trust", "accept", "--scope", "demo", "--yes"]));
    let output = t.vault(&["trust", "status", "--scope", "demo", "--json"]);
    assert_eq!(json(&output)["state"], "ok");
    assert_success(&t.set("demo", "K", "V"));

    let output = t.vault(&["trust", "forget", "--scope", "demo", "--json"]);
    assert_success(&output);
    assert_eq!(json(&output)["removed"], true);
    let output = t.vault(&["trust", "status", "--scope", "demo"]);
    assert_success(&output);
    assert_stdout_contains(&output, "untrusted");
}

#[test]
fn test_forgotten_scope_is_pinned_again_on_write() {
    let t = Test::init("demo");
    assert_success(&t.vault(&["trust", "forget", "--scope", "demo"]));
    t.sun.replace_identity();

    assert_success(&t.set("demo", "K", "V"));
    let output = t.vault(&["trust", "status", "--scope", "demo", "--json"]);
    assert_eq!(json(&output)["state"], "ok");
}

#[test]
fn test_init_on_drifted_scope_without_terminal_fails() {
    let t = Test::init("demo");
    t.sun.replace_identity();

    assert_exit(&t.init_cmd("demo"), 4);
    assert_success(&t.vault(&["init", "--scope", "demo", "--accept-new-recipients"]));
}
