//! `set`, `get`, `unset`, `list`, `history`.

use std::io::{self, IsTerminal, Read};

use dialoguer::Password;
use serde_json::json;

use super::Session;
use crate::cli::output;
use crate::core::vault::ValueView;
use crate::error::Result;

pub(super) fn set(s: &mut Session, key: &str, value: Option<String>) -> Result<()> {
    let value = match value {
        Some(v) => v,
        None => read_value(key)?,
    };
    let revision = s.vault.set(&s.target, key, &value)?;

    if s.json {
        return output::json(&json!({
            "scope": s.target.scope.as_str(),
            "key": key,
            "revision": revision,
        }));
    }
    output::success(&format!(
        "set {} in {} (rev {})",
        output::key(key),
        s.target.display,
        revision
    ));
    Ok(())
}

/// Piped stdin verbatim (minus one trailing newline), or a hidden prompt.
fn read_value(key: &str) -> Result<String> {
    if !io::stdin().is_terminal() {
        let mut input = String::new();
        io::stdin().read_to_string(&mut input)?;
        let trimmed = input
            .strip_suffix("\r\n")
            .or_else(|| input.strip_suffix('\n'))
            .unwrap_or(input.as_str());
        return Ok(trimmed.to_string());
    }
    let value = Password::new()
        .with_prompt(format!("Value for {}", key))
        .interact()?;
    Ok(value)
}

pub(super) fn get(s: &mut Session, key: &str, reveal: bool) -> Result<()> {
    let view = s.vault.get(&s.target, key, reveal)?;

    if s.json {
        let mut out = json!({
            "scope": s.target.scope.as_str(),
            "key": key,
            "encrypted": !matches!(view, ValueView::Plaintext),
        });
        if let ValueView::Revealed(v) = &view {
            out["value"] = json!(v.as_str());
        }
        return output::json(&out);
    }

    match view {
        ValueView::Revealed(v) => output::data(v.as_str()),
        ValueView::Encrypted(_) => output::data(format!("{}: encrypted (use --reveal)", key)),
        ValueView::Plaintext => {
            output::data(format!("{}: plaintext (use --reveal)", key));
            output::hint(&format!(
                "encrypt it: {}",
                output::cmd(&format!("si vault encrypt {} --scope {}", key, s.target.scope))
            ));
        }
    }
    Ok(())
}

pub(super) fn unset(s: &mut Session, key: &str) -> Result<()> {
    let revision = s.vault.unset(&s.target, key)?;
    if s.json {
        return output::json(&json!({
            "scope": s.target.scope.as_str(),
            "key": key,
            "revision": revision,
            "deleted": true,
        }));
    }
    output::success(&format!("unset {} in {}", output::key(key), s.target.display));
    Ok(())
}

pub(super) fn list(s: &mut Session, reveal: bool) -> Result<()> {
    let entries = s.vault.list(&s.target, reveal)?;

    if s.json {
        let items: Vec<_> = entries
            .iter()
            .map(|(key, view)| {
                let mut item = json!({
                    "key": key,
                    "encrypted": !matches!(view, ValueView::Plaintext),
                });
                if view.is_revealed() {
                    item["value"] = json!(view.masked());
                }
                item
            })
            .collect();
        return output::json(&json!({
            "scope": s.target.scope.as_str(),
            "count": items.len(),
            "keys": items,
        }));
    }

    if entries.is_empty() {
        output::dimmed(&format!("no keys in {}", s.target.display));
        return Ok(());
    }
    for (key, view) in &entries {
        output::data(format!("{}={}", key, view.masked()));
    }
    Ok(())
}

pub(super) fn history(s: &mut Session, key: &str, limit: usize) -> Result<()> {
    let entries = s.vault.history(&s.target, key, limit)?;

    if s.json {
        return output::json(&json!({
            "scope": s.target.scope.as_str(),
            "key": key,
            "revisions": entries,
        }));
    }

    output::data(format!("{} ({})", key, s.target.display));
    for e in &entries {
        let mut line = format!(
            "  rev={} changed_at={} operation={}",
            e.revision, e.changed_at, e.operation
        );
        if e.deleted {
            line.push_str(" deleted=true");
        }
        if let Some(sha) = &e.value_sha256 {
            line.push_str(&format!(" value_sha256={}", sha));
        }
        output::data(line);
    }
    Ok(())
}
