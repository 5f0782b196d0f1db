//! Tests for `si vault set/get/unset/list/history`.

use predicates::prelude::*;

use crate::support::*;

#[test]
fn test_set_and_reveal_roundtrip() {
    let t = Test::init("demo");
    assert_success(&t.set("demo", "API_TOKEN", "shh-42"));

    let output = t.reveal("demo", "API_TOKEN");
    assert_exit(&output, 0);
    assert_eq!(stdout(&output), "shh-42\n");
}

#[test]
fn test_values_are_stored_encrypted() {
    let t = Test::with_values("demo", &[("API_TOKEN", "shh-42")]);

    let stored = t.sun.payload("vault_kv.demo", "API_TOKEN");
    assert!(stored.starts_with("enc:v1:"));
    assert!(!stored.contains("shh-42"));

    let meta = t.sun.metadata("vault_kv.demo", "API_TOKEN");
    assert_eq!(meta["operation"], "set");
    assert_eq!(meta["deleted"], false);
    assert_eq!(meta["source"], "cli");
    assert_eq!(meta["value_sha256"].as_str().unwrap().len(), 64);
}

#[test]
fn test_get_without_reveal_is_masked() {
    let t = Test::with_values("demo", &[("API_TOKEN", "shh-42")]);

    let output = t.get("demo", "API_TOKEN");
    assert_success(&output);
    assert_stdout_contains(&output, "API_TOKEN: encrypted (use --reveal)");
    assert_stdout_excludes(&output, "shh-42");
}

#[test]
fn test_list_masks_by_default() {
    let t = Test::with_values("demo", &[("API_TOKEN", "shh-42")]);

    let output = t.list("demo");
    assert_exit(&output, 0);
    assert_stdout_contains(&output, "API_TOKEN=enc:v1:");
    assert_stdout_excludes(&output, "shh-42");
}

#[test]
fn test_list_reveal_and_json() {
    let t = Test::with_values("demo", STANDARD_VALUES);

    let output = t.vault(&["list", "--scope", "demo", "--reveal"]);
    assert_success(&output);
    for (k, v) in STANDARD_VALUES {
        assert_stdout_contains(&output, &format!("{}={}", k, v));
    }

    let output = t.vault(&["list", "--scope", "demo", "--json"]);
    assert_success(&output);
    let listed = json(&output);
    assert_eq!(listed["count"], 3);
    let keys: Vec<&str> = listed["keys"]
        .as_array()
        .unwrap()
        .iter()
        .map(|k| k["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["API_KEY", "DATABASE_URL", "JWT_SECRET"]);
    assert!(listed["keys"][0].get("value").is_none());
}

#[test]
fn test_set_overwrites() {
    let t = Test::with_values("demo", &[("API_KEY", "old")]);
    assert_roundtrip(&t, "demo", "API_KEY", "new");
}

#[test]
fn test_set_reads_piped_stdin() {
    let t = Test::init("demo");
    t.cmd()
        .args(["vault", "set", "PEM", "--scope", "demo"])
        .write_stdin("line one\nline two\n")
        .assert()
        .success();

    let output = t.reveal("demo", "PEM");
    assert_success(&output);
    assert_eq!(stdout(&output), "line one\nline two\n");
}

#[test]
fn test_scopes_are_isolated() {
    let t = Test::init("alpha");
    assert_success(&t.init_cmd("beta"));
    assert_success(&t.set("alpha", "SHARED", "a"));
    assert_success(&t.set("beta", "SHARED", "b"));

    assert_stdout_contains(&t.reveal("alpha", "SHARED"), "a");
    assert_stdout_contains(&t.reveal("beta", "SHARED"), "b");
    assert_exit(&t.get("gamma", "SHARED"), 3);
}

#[test]
fn test_unset_tombstones_and_history() {
    let t = Test::with_values("demo", &[("API_TOKEN", "shh-42")]);

    assert_success(&t.unset("demo", "API_TOKEN"));
    assert_exit(&t.get("demo", "API_TOKEN"), 3);
    assert_stdout_excludes(&t.list("demo"), "API_TOKEN");

    let meta = t.sun.metadata("vault_kv.demo", "API_TOKEN");
    assert_eq!(meta["deleted"], true);
    assert_eq!(meta["operation"], "unset");
    assert!(meta.get("value_sha256").is_none());

    let output = t.vault(&["history", "API_TOKEN", "--scope", "demo", "--limit", "3"]);
    assert_success(&output);
    let out = stdout(&output);
    let revisions: Vec<&str> = out.lines().filter(|l| l.contains("rev=")).collect();
    assert_eq!(revisions.len(), 2);
    assert!(revisions[0].contains("rev=2"));
    assert!(revisions[0].contains("operation=unset"));
    assert!(revisions[0].contains("deleted=true"));
    assert!(revisions[1].contains("operation=set"));
    assert!(revisions[1].contains("value_sha256="));
}

#[test]
fn test_unset_missing_key_is_not_found() {
    let t = Test::init("demo");
    let output = t.unset("demo", "NOPE");
    assert_exit(&output, 3);
    assert_stderr_contains(&output, "NOPE not found in scope demo");
}

#[test]
fn test_history_json_and_limit() {
    let t = Test::init("demo");
    for v in ["1", "2", "3"] {
        assert_success(&t.set("demo", "COUNTER", v));
    }

    let output = t.vault(&["history", "COUNTER", "--scope", "demo", "--limit", "2", "--json"]);
    assert_success(&output);
    let revs = json(&output)["revisions"].as_array().unwrap().clone();
    assert_eq!(revs.len(), 2);
    assert_eq!(revs[0]["revision"], 3);
    assert_eq!(revs[1]["revision"], 2);
    assert!(revs[0]["changed_at"].as_str().unwrap() > revs[1]["changed_at"].as_str().unwrap());
}

#[test]
fn test_history_rejects_zero_limit() {
    let t = Test::with_values("demo", &[("K", "v")]);
    assert_exit(&t.vault(&["history", "K", "--scope", "demo", "--limit", "0"]), 2);
}

#[test]
fn test_history_of_unknown_key() {
    let t = Test::init("demo");
    assert_exit(&t.vault(&["history", "NEVER", "--scope", "demo"]), 3);
}

#[test]
fn test_invalid_key_names_rejected() {
    let t = Test::init("demo");
    for key in ["lower", "1LEADING", "HAS-DASH", "HAS SPACE"] {
        let output = t.set("demo", key, "v");
        assert_exit(&output, 2);
        assert_stderr_contains(&output, "invalid key");
    }
}

#[test]
fn test_get_reveal_json() {
    let t = Test::with_values("demo", &[("API_TOKEN", "shh-42")]);
    t.cmd()
        .args(["vault", "get", "API_TOKEN", "--scope", "demo", "--reveal", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"value\": \"shh-42\""));
}

#[test]
fn test_mutations_are_audited_without_values() {
    let t = Test::with_values("demo", &[("API_TOKEN", "shh-42")]);
    assert_success(&t.reveal("demo", "API_TOKEN"));

    let audit = t.audit();
    let ops: Vec<&str> = audit.iter().map(|r| r["op"].as_str().unwrap()).collect();
    assert_eq!(ops, vec!["init", "set", "reveal"]);
    assert_eq!(audit[1]["key"], "API_TOKEN");
    let raw = std::fs::read_to_string(t.vault_dir().join("audit.log")).unwrap();
    assert!(!raw.contains("shh-42"));
}

#[test]
fn test_list_warns_at_key_limit() {
    let t = Test::init("demo");
    for i in 0..1000 {
        let key = format!("K{:04}", i);
        t.sun.seed(
            "vault_kv.demo",
            &key,
            "v",
            serde_json::json!({ "scope": "demo", "key": key }),
        );
    }

    let output = t.list("demo");
    assert_success(&output);
    assert_stdout_contains(&output, "K0999=");
    assert_stderr_contains(&output, "keys past the limit are ignored");
}
