//! `init`, `encrypt`, `decrypt`, `check`, `rotate`.

use serde_json::json;

use super::Session;
use crate::cli::output;
use crate::core::config::Settings;
use crate::error::Result;

pub(super) fn init(s: &mut Session, set_default: bool) -> Result<()> {
    let report = s.vault.init(&s.target)?;
    if set_default {
        Settings::save_default_scope(&s.home, s.target.scope.as_str())?;
    }

    if s.json {
        return output::json(&json!({
            "scope": report.scope,
            "recipient": report.recipient,
            "fingerprint": report.fingerprint,
            "identity_created": report.identity_created,
            "default": set_default,
        }));
    }

    if report.identity_created {
        output::success("created vault identity");
    }
    output::success(&format!("vault ready for {}", s.target.display));
    output::kv("recipient", &report.recipient);
    output::kv("fingerprint", &report.fingerprint);
    if set_default {
        output::kv("default", &report.scope);
    }
    output::hint(&format!(
        "next: {}",
        output::cmd(&format!("si vault set KEY --scope {}", report.scope))
    ));
    Ok(())
}

pub(super) fn encrypt(s: &mut Session, keys: &[String]) -> Result<()> {
    let report = s.vault.encrypt(&s.target, keys)?;

    if s.json {
        return output::json(&report);
    }
    if report.encrypted.is_empty() {
        output::success(&format!(
            "nothing to encrypt ({} already encrypted)",
            report.already_encrypted
        ));
        return Ok(());
    }
    for key in &report.encrypted {
        output::list_item(&output::key(key));
    }
    output::success(&format!(
        "encrypted {} key(s) in {}",
        report.encrypted.len(),
        s.target.display
    ));
    Ok(())
}

pub(super) fn decrypt(s: &mut Session, keys: &[String], in_place: bool) -> Result<()> {
    let pairs = s.vault.decrypt(&s.target, keys, in_place)?;

    if s.json {
        let map: serde_json::Map<String, serde_json::Value> = pairs
            .iter()
            .map(|(k, v)| (k.clone(), json!(v.as_str())))
            .collect();
        return output::json(&map);
    }
    for (key, value) in &pairs {
        output::data(format!("{}={}", key, value.as_str()));
    }
    Ok(())
}

pub(super) fn check(s: &mut Session) -> Result<()> {
    let report = s.vault.check(&s.target)?;
    if s.json {
        return output::json(&json!({
            "scope": report.scope,
            "keys": report.keys,
            "ok": true,
        }));
    }
    output::success(&format!(
        "{}: {} key(s), all encrypted",
        s.target.display, report.keys
    ));
    Ok(())
}

pub(super) fn rotate(s: &mut Session, scopes: &[String]) -> Result<()> {
    let targets = if scopes.is_empty() {
        vec![s.target.clone()]
    } else {
        scopes
            .iter()
            .map(|raw| s.target_for(raw))
            .collect::<Result<Vec<_>>>()?
    };
    let report = s.vault.rotate(&targets)?;

    if s.json {
        let rotated: Vec<_> = report
            .scopes
            .iter()
            .map(|(scope, keys)| json!({ "scope": scope, "keys": keys }))
            .collect();
        return output::json(&json!({
            "recipient": report.recipient,
            "fingerprint": report.fingerprint,
            "scopes": rotated,
        }));
    }

    output::success("rotated vault identity");
    output::kv("recipient", &report.recipient);
    output::kv("fingerprint", &report.fingerprint);
    for (scope, keys) in &report.scopes {
        output::list_item(&format!("{}: {} key(s) re-encrypted", scope, keys));
    }
    output::warn("values in scopes not listed stay encrypted to the old identity");
    Ok(())
}
