//! `recipients` and `trust`.

use serde_json::json;

use super::{RecipientsAction, Session, TrustAction};
use crate::cli::output;
use crate::core::vault::TrustState;
use crate::error::Result;

pub(super) fn execute(s: &mut Session, action: RecipientsAction) -> Result<()> {
    match action {
        RecipientsAction::List => list(s),
        RecipientsAction::Add { recipient } => s.vault.recipients_add(&s.target, &recipient),
        RecipientsAction::Remove { recipient } => {
            s.vault.recipients_remove(&s.target, &recipient)
        }
    }
}

fn list(s: &mut Session) -> Result<()> {
    let recipients = s.vault.recipients_list(&s.target)?;
    if s.json {
        return output::json(&recipients);
    }
    output::data(format!("recipients for {}:", s.target.display));
    for r in &recipients {
        output::list_item(&format!("{}  ({})", r.recipient, r.source));
    }
    Ok(())
}

pub(super) fn trust(s: &mut Session, action: TrustAction) -> Result<()> {
    match action {
        TrustAction::Status => status(s),
        TrustAction::Accept => {
            let fingerprint = s.vault.trust_accept(&s.target)?;
            if s.json {
                return output::json(&json!({
                    "scope": s.target.scope.as_str(),
                    "fingerprint": fingerprint,
                }));
            }
            output::success(&format!("trusted {}", s.target.display));
            output::kv("fingerprint", &fingerprint);
            Ok(())
        }
        TrustAction::Forget => {
            let removed = s.vault.trust_forget(&s.target)?;
            if s.json {
                return output::json(&json!({
                    "scope": s.target.scope.as_str(),
                    "removed": removed,
                }));
            }
            if removed {
                output::success(&format!("forgot trust for {}", s.target.display));
            } else {
                output::dimmed(&format!("no trust entry for {}", s.target.display));
            }
            Ok(())
        }
    }
}

fn status(s: &mut Session) -> Result<()> {
    let status = s.vault.trust_status(&s.target)?;
    if s.json {
        return output::json(&status);
    }

    output::kv("scope", &status.scope);
    output::kv("repo", &status.repo_root);
    output::kv("current", &status.current);
    output::kv("stored", status.stored.as_deref().unwrap_or("-"));
    output::kv("state", status.state);
    match status.state {
        TrustState::Ok => {}
        TrustState::Untrusted => output::hint(&format!(
            "pin it: {}",
            output::cmd(&format!("si vault trust accept --scope {}", status.scope))
        )),
        TrustState::Mismatch => {
            output::warn("recipients changed since this scope was trusted");
            output::hint(&format!(
                "if expected: {}",
                output::cmd(&format!("si vault trust accept --scope {}", status.scope))
            ));
        }
    }
    Ok(())
}
