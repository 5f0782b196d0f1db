//! Recipients and trust management.
//!
//! In remote mode the recipient set of every scope is the account
//! identity's recipient, so add/remove are refused.

use serde::Serialize;

use super::Vault;
use crate::core::scope::Target;
use crate::core::trust::fingerprint;
use crate::error::{Result, VaultError};

/// One recipient and where it comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientInfo {
    pub recipient: String,
    pub source: String,
}

/// Comparison of the pinned and current fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustState {
    Ok,
    Mismatch,
    Untrusted,
}

impl std::fmt::Display for TrustState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TrustState::Ok => "ok",
            TrustState::Mismatch => "mismatch",
            TrustState::Untrusted => "untrusted",
        })
    }
}

/// Result of [`Vault::trust_status`].
#[derive(Debug, Clone, Serialize)]
pub struct TrustStatus {
    pub scope: String,
    pub repo_root: String,
    pub current: String,
    pub stored: Option<String>,
    pub state: TrustState,
}

impl Vault {
    pub fn recipients_list(&mut self, target: &Target) -> Result<Vec<RecipientInfo>> {
        let result = self.recipients_inner(target);
        self.audited("recipients.list", target, None, result)
    }

    fn recipients_inner(&mut self, target: &Target) -> Result<Vec<RecipientInfo>> {
        self.observe(target)?;
        Ok(self
            .recipients()?
            .into_iter()
            .map(|recipient| RecipientInfo {
                recipient,
                source: "sun identity (vault_identity/default)".to_string(),
            })
            .collect())
    }

    /// Always `Unsupported`.
    pub fn recipients_add(&mut self, target: &Target, recipient: &str) -> Result<()> {
        let result = unsupported("recipients add");
        self.audited("recipients.add", target, Some(recipient), result)
    }

    /// Always `Unsupported`.
    pub fn recipients_remove(&mut self, target: &Target, recipient: &str) -> Result<()> {
        let result = unsupported("recipients remove");
        self.audited("recipients.remove", target, Some(recipient), result)
    }

    pub fn trust_status(&mut self, target: &Target) -> Result<TrustStatus> {
        let result = self.trust_status_inner(target);
        self.audited("trust.status", target, None, result)
    }

    fn trust_status_inner(&mut self, target: &Target) -> Result<TrustStatus> {
        let current = fingerprint(&self.recipients()?);
        let repo_root = target.repo_key();
        let stored = self
            .trust
            .entry(&repo_root, target.scope.as_str())
            .map(|e| e.fingerprint.clone());
        let state = match &stored {
            None => TrustState::Untrusted,
            Some(fp) if *fp == current => TrustState::Ok,
            Some(_) => TrustState::Mismatch,
        };
        Ok(TrustStatus {
            scope: target.scope.to_string(),
            repo_root,
            current,
            stored,
            state,
        })
    }

    /// Pin the current fingerprint. Needs `--yes` or an interactive yes.
    pub fn trust_accept(&mut self, target: &Target) -> Result<String> {
        let result = self.trust_accept_inner(target);
        self.audited("trust.accept", target, None, result)
    }

    fn trust_accept_inner(&mut self, target: &Target) -> Result<String> {
        let current = fingerprint(&self.recipients()?);
        if !self.options.assume_yes {
            if self.options.confirm.is_none() {
                return Err(VaultError::ConfirmationRequired(
                    "non-interactive: use --yes to accept trust".into(),
                )
                .into());
            }
            let prompt = format!(
                "Accept vault trust for scope {} with fingerprint {}?",
                target.scope, current
            );
            if !self.ask(&prompt) {
                return Err(VaultError::ConfirmationRequired("trust not accepted".into()).into());
            }
        }
        self.trust.upsert(
            &target.repo_key(),
            target.scope.as_str(),
            &current,
            self.clock.now(),
        )?;
        Ok(current)
    }

    /// Drop the pinned entry. Returns whether one existed.
    pub fn trust_forget(&mut self, target: &Target) -> Result<bool> {
        let result = self
            .trust
            .forget(&target.repo_key(), target.scope.as_str());
        self.audited("trust.forget", target, None, result)
    }
}

fn unsupported(what: &str) -> Result<()> {
    Err(VaultError::Unsupported(what.to_string()).into())
}
