//! Tests for `si vault check/encrypt/decrypt/rotate` and the unsupported
//! local-file verbs.

use serde_json::json;

use crate::support::*;

fn seed_plaintext(t: &Test, key: &str, value: &str) {
    t.sun.seed(
        "vault_kv.demo",
        key,
        value,
        json!({ "scope": "demo", "key": key, "deleted": false }),
    );
}

#[test]
fn test_check_passes_when_encrypted() {
    let t = Test::with_values("demo", STANDARD_VALUES);
    let output = t.vault(&["check", "--scope", "demo"]);
    assert_success(&output);
    assert_stdout_contains(&output, "3 key(s), all encrypted");
}

#[test]
fn test_plaintext_remediation() {
    let t = Test::init("demo");
    seed_plaintext(&t, "LEGACY", "plain");

    let output = t.vault(&["check", "--scope", "demo"]);
    assert_exit(&output, 2);
    assert_stderr_contains(&output, "LEGACY");
    assert_stderr_contains(&output, "si vault encrypt --scope demo");

    let output = t.vault(&["encrypt", "--scope", "demo"]);
    assert_success(&output);
    assert_stdout_contains(&output, "LEGACY");
    assert!(t.sun.payload("vault_kv.demo", "LEGACY").starts_with("enc:v1:"));

    let output = t.reveal("demo", "LEGACY");
    assert_success(&output);
    assert_eq!(stdout(&output), "plain\n");

    assert_success(&t.vault(&["check", "--scope", "demo"]));
}

#[test]
fn test_encrypt_leaves_ciphertext_alone() {
    let t = Test::with_values("demo", &[("A", "1")]);
    let before = t.sun.payload("vault_kv.demo", "A");

    let output = t.vault(&["encrypt", "--scope", "demo", "--json"]);
    assert_success(&output);
    let report = json(&output);
    assert_eq!(report["encrypted"], json!([]));
    assert_eq!(report["already_encrypted"], 1);
    assert_eq!(t.sun.payload("vault_kv.demo", "A"), before);
}

#[test]
fn test_encrypt_unknown_key_is_not_found() {
    let t = Test::with_values("demo", &[("A", "1")]);
    assert_exit(&t.vault(&["encrypt", "MISSING", "--scope", "demo"]), 3);
}

#[test]
fn test_get_plaintext_without_reveal() {
    let t = Test::init("demo");
    seed_plaintext(&t, "LEGACY", "plain");

    let output = t.get("demo", "LEGACY");
    assert_success(&output);
    assert_stdout_contains(&output, "LEGACY: plaintext");
    assert_stdout_excludes(&output, "plain\n");
}

#[test]
fn test_decrypt_prints_pairs() {
    let t = Test::with_values("demo", &[("A", "one"), ("B", "two")]);

    let output = t.vault(&["decrypt", "--scope", "demo"]);
    assert_success(&output);
    assert_eq!(stdout(&output), "A=one\nB=two\n");

    let output = t.vault(&["decrypt", "B", "--scope", "demo"]);
    assert_success(&output);
    assert_eq!(stdout(&output), "B=two\n");

    // Remote values are untouched.
    assert!(t.sun.payload("vault_kv.demo", "A").starts_with("enc:v1:"));
}

#[test]
fn test_decrypt_in_place_is_unsupported() {
    let t = Test::with_values("demo", &[("A", "one")]);
    let output = t.vault(&["decrypt", "--scope", "demo", "--in-place"]);
    assert_exit(&output, 6);
    assert_stderr_contains(&output, "not supported in Sun remote vault mode");

    let last = t.audit().pop().unwrap();
    assert_eq!(last["op"], "decrypt");
    assert_eq!(last["outcome"], "denied");
}

#[test]
fn test_recipients_list_and_unsupported_changes() {
    let t = Test::init("demo");

    let output = t.vault(&["recipients", "list", "--scope", "demo", "--json"]);
    assert_success(&output);
    let listed = json(&output);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert!(listed[0]["recipient"].as_str().unwrap().starts_with("age1"));

    let output = t.vault(&["recipients", "add", "--scope", "demo", OTHER_RECIPIENT]);
    assert_exit(&output, 6);
    assert_stderr_contains(&output, "not supported in Sun remote vault mode");

    assert_exit(
        &t.vault(&["recipients", "remove", "--scope", "demo", OTHER_RECIPIENT]),
        6,
    );
}

#[test]
fn test_rotate_requires_yes() {
    let t = Test::with_values("demo", &[("A", "one")]);
    let before = t.sun.payload("vault_identity", "default");

    let output = t.vault(&["rotate", "--scope", "demo"]);
    assert_exit(&output, 2);
    assert_stderr_contains(&output, "--yes");
    assert_eq!(t.sun.payload("vault_identity", "default"), before);
}

#[test]
fn test_rotate_reencrypts_listed_scopes() {
    let t = Test::with_values("demo", &[("A", "one")]);
    assert_success(&t.init_cmd("side"));
    assert_success(&t.set("side", "B", "two"));
    let identity_before = t.sun.payload("vault_identity", "default");
    let value_before = t.sun.payload("vault_kv.demo", "A");

    let output = t.vault(&["rotate", "demo", "--yes", "--json"]);
    assert_success(&output);
    let report = json(&output);
    assert_eq!(report["scopes"][0]["scope"], "demo");
    assert_eq!(report["scopes"][0]["keys"], 1);

    assert_ne!(t.sun.payload("vault_identity", "default"), identity_before);
    assert_ne!(t.sun.payload("vault_kv.demo", "A"), value_before);
    assert_eq!(stdout(&t.reveal("demo", "A")), "one\n");

    // Not listed: still encrypted to the old identity.
    let output = t.reveal("side", "B");
    assert!(!output.status.success());
}
