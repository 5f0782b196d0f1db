//! Tests for `si vault init`.

use crate::support::*;

#[test]
fn test_init_creates_identity_and_pins_scope() {
    let t = Test::new();

    let output = t.vault(&["init", "--scope", "demo", "--json"]);
    assert_success(&output);
    let report = json(&output);
    assert_eq!(report["scope"], "demo");
    assert_eq!(report["identity_created"], true);
    assert!(report["recipient"].as_str().unwrap().starts_with("age1"));

    let identity = t.sun.payload("vault_identity", "default");
    assert!(identity.starts_with("AGE-SECRET-KEY-1"));

    let trust = std::fs::read_to_string(t.vault_dir().join("trust.json")).unwrap();
    assert!(trust.contains("\"scope\": \"demo\""));
    assert!(trust.contains(report["fingerprint"].as_str().unwrap()));
}

#[test]
fn test_init_is_idempotent() {
    let t = Test::init("demo");
    let first = t.sun.payload("vault_identity", "default");

    let output = t.vault(&["init", "--scope", "demo", "--json"]);
    assert_success(&output);
    assert_eq!(json(&output)["identity_created"], false);
    assert_eq!(t.sun.payload("vault_identity", "default"), first);
}

#[test]
fn test_init_writes_no_values() {
    let t = Test::init("demo");
    let output = t.vault(&["list", "--scope", "demo", "--json"]);
    assert_success(&output);
    assert_eq!(json(&output)["count"], 0);
}

#[test]
fn test_init_set_default_is_used_without_scope() {
    let t = Test::new();
    assert_success(&t.vault(&["init", "--scope", "team/prod", "--set-default"]));

    let settings = std::fs::read_to_string(t.settings_path()).unwrap();
    assert!(settings.contains("default_scope = \"team/prod\""));

    assert_success(&t.vault(&["set", "REGION", "eu-west-1"]));
    let output = t.reveal("team/prod", "REGION");
    assert_success(&output);
    assert_stdout_contains(&output, "eu-west-1");
}

#[test]
fn test_init_is_audited() {
    let t = Test::init("demo");
    let audit = t.audit();
    let last = audit.last().expect("audit record");
    assert_eq!(last["op"], "init");
    assert_eq!(last["scope"], "demo");
    assert_eq!(last["outcome"], "ok");
    assert_eq!(last["source"], "cli");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(t.vault_dir().join("audit.log"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn test_scope_is_normalized() {
    let t = Test::init("demo");
    assert_success(&t.set("Demo", "API_KEY", "abc"));
    let output = t.reveal("demo", "API_KEY");
    assert_success(&output);
    assert_stdout_contains(&output, "abc");
}
