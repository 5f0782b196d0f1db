//! Tests for `si vault dump/import/run`.

use predicates::prelude::*;
use serde_json::json;

use crate::support::*;

#[test]
fn test_dump_is_encrypted_document() {
    let t = Test::with_values("demo", &[("B", "two"), ("A", "one")]);

    let output = t.vault(&["dump", "--scope", "demo"]);
    assert_success(&output);
    let out = stdout(&output);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "# si-vault:v1");
    assert!(lines[1].starts_with("# si-vault:recipient age1"));
    assert!(lines[2].starts_with("# si-vault:fingerprint "));
    assert_eq!(lines[3], "");
    assert!(lines[4].starts_with("A=enc:v1:"));
    assert!(lines[5].starts_with("B=enc:v1:"));
    assert!(!out.contains("=one"));
}

#[test]
fn test_import_encrypts_plaintext() {
    let t = Test::init("demo");
    let path = t.write_file(".env", SAMPLE_ENV);

    let output = t.vault(&["import", path.to_str().unwrap(), "--scope", "demo"]);
    assert_success(&output);
    assert_stdout_contains(&output, "imported 3 key(s)");

    assert!(t.sun.payload("vault_kv.demo", "KEY2").starts_with("enc:v1:"));
    assert_eq!(stdout(&t.reveal("demo", "KEY1")), "value1\n");
    assert_eq!(stdout(&t.reveal("demo", "KEY2")), "two words\n");
    assert_eq!(stdout(&t.reveal("demo", "KEY3")), "single quoted\n");
}

#[test]
fn test_import_mirror_tombstones_missing_keys() {
    let t = Test::with_values("demo", &[("OLD", "o"), ("KEY1", "stale")]);
    let path = t.write_file("prod.env", "KEY1=fresh\n");

    let output = t.vault(&["import", path.to_str().unwrap(), "--mirror", "--scope", "demo", "--json"]);
    assert_success(&output);
    assert_eq!(json(&output), json!({ "pushed": 1, "tombstoned": 1 }));

    let meta = t.sun.metadata("vault_kv.demo", "OLD");
    assert_eq!(meta["deleted"], true);
    assert_eq!(meta["source"], "mirror");
    assert_exit(&t.get("demo", "OLD"), 3);
    assert_eq!(stdout(&t.reveal("demo", "KEY1")), "fresh\n");

    let last = t.audit().pop().unwrap();
    assert_eq!(last["op"], "import.mirror");
    assert_eq!(last["source"], "mirror");
}

#[test]
fn test_dump_then_import_into_other_scope() {
    let t = Test::with_values("demo", STANDARD_VALUES);
    let output = t.vault(&["dump", "--scope", "demo"]);
    assert_success(&output);
    let path = t.write_file("dump.env", &stdout(&output));

    assert_success(&t.init_cmd("copy"));
    assert_success(&t.vault(&["import", path.to_str().unwrap(), "--scope", "copy"]));
    for (k, v) in STANDARD_VALUES {
        assert_eq!(stdout(&t.reveal("copy", k)), format!("{}\n", v));
    }
}

#[cfg(unix)]
#[test]
fn test_run_injects_values() {
    let t = Test::with_values("demo", &[("API_TOKEN", "shh-42")]);

    t.cmd()
        .args([
            "vault",
            "run",
            "--scope",
            "demo",
            "--",
            "sh",
            "-c",
            "printf '%s' \"$API_TOKEN\"",
        ])
        .assert()
        .success()
        .stdout("shh-42");
}

#[cfg(unix)]
#[test]
fn test_run_propagates_exit_code() {
    let t = Test::with_values("demo", &[("A", "1")]);
    let output = t.vault(&["run", "--scope", "demo", "--", "sh", "-c", "exit 7"]);
    assert_exit(&output, 7);
}

#[cfg(unix)]
#[test]
fn test_run_refuses_plaintext() {
    let t = Test::with_values("demo", &[("A", "1")]);
    t.sun.seed(
        "vault_kv.demo",
        "LEGACY",
        "plain",
        json!({ "scope": "demo", "key": "LEGACY", "deleted": false }),
    );

    t.cmd()
        .args(["vault", "run", "--scope", "demo", "--", "sh", "-c", "echo ran"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("ran").not())
        .stderr(predicate::str::contains("LEGACY"));

    t.cmd()
        .args([
            "vault",
            "run",
            "--scope",
            "demo",
            "--allow-plaintext",
            "--",
            "sh",
            "-c",
            "printf '%s' \"$LEGACY\"",
        ])
        .assert()
        .success()
        .stdout("plain");
}
