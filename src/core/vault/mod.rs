//! Vault orchestration.
//!
//! [`Vault`] owns everything one command needs: the Sun store, the identity
//! service, the trust store, the audit log and the clock, bundled in a
//! [`VaultContext`]. Verbs are split by concern:
//!
//! - `secrets`: set, get, unset, list, history
//! - `lifecycle`: init, encrypt, decrypt, check, rotate
//! - `recipients`: recipients and trust management
//! - `transfer`: dump, import, run
//!
//! Every verb writes exactly one audit record, whatever the outcome.

mod lifecycle;
mod recipients;
mod secrets;
mod transfer;

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::core::audit::{AuditLog, Outcome, Record};
use crate::core::cipher;
use crate::core::clock::{Clock, SystemClock};
use crate::core::config::Settings;
use crate::core::constants::{ENC_PREFIX, SOURCE_CLI};
use crate::core::identity::{Identity, IdentityService};
use crate::core::kv::VaultKv;
use crate::core::scope::Target;
use crate::core::sun::{HttpSun, SunStore};
use crate::core::trust::{fingerprint, TrustStore, Verdict};
use crate::error::{Error, ErrorKind, Result, VaultError};

pub use lifecycle::{CheckReport, EncryptReport, InitReport, RotateReport};
pub use recipients::{RecipientInfo, TrustState, TrustStatus};

/// Interactive yes/no prompt supplied by the command layer.
pub type Confirm = Box<dyn Fn(&str) -> bool>;

/// Shared state of one command.
pub struct VaultContext {
    pub sun: Arc<dyn SunStore>,
    pub trust: TrustStore,
    pub audit: AuditLog,
    pub clock: Arc<dyn Clock>,
}

impl VaultContext {
    /// Build the context from settings: HTTP Sun client, trust store and
    /// audit log at their configured paths.
    ///
    /// # Errors
    ///
    /// `NotConfigured` without a Sun URL or token, or if the trust store
    /// cannot be read.
    pub fn from_settings(settings: &Settings, home: &Path) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let sun = HttpSun::from_settings(&settings.sun)?;
        let trust = TrustStore::open(settings.trust_path(home))?;
        let audit = if settings.vault.audit.or(true) {
            AuditLog::new(settings.audit_path(home), clock.clone())
        } else {
            AuditLog::disabled(clock.clone())
        };
        Ok(Self {
            sun: Arc::new(sun),
            trust,
            audit,
            clock,
        })
    }
}

/// Per-command behaviour switches.
pub struct VaultOptions {
    /// Admit a changed recipient set instead of failing.
    pub accept_new_recipients: bool,
    /// `--yes`: skip confirmations.
    pub assume_yes: bool,
    /// Send `if_match_rev` on KV writes.
    pub gate_writes: bool,
    /// Audit/metadata source tag.
    pub source: String,
    pub confirm: Option<Confirm>,
}

impl Default for VaultOptions {
    fn default() -> Self {
        Self {
            accept_new_recipients: false,
            assume_yes: false,
            gate_writes: false,
            source: SOURCE_CLI.to_string(),
            confirm: None,
        }
    }
}

/// How a stored value is shown.
#[derive(Debug)]
pub enum ValueView {
    /// Decrypted (or stored-plaintext) value.
    Revealed(Zeroizing<String>),
    /// Masked ciphertext.
    Encrypted(String),
    /// Masked plaintext.
    Plaintext,
}

impl ValueView {
    pub fn is_revealed(&self) -> bool {
        matches!(self, ValueView::Revealed(_))
    }

    /// Masked form for listings: `enc:v1:` plus a short tail of the body.
    pub fn masked(&self) -> String {
        match self {
            ValueView::Revealed(v) => v.to_string(),
            ValueView::Encrypted(c) => {
                let body = c.strip_prefix(ENC_PREFIX).unwrap_or(c);
                let short: String = body.chars().take(12).collect();
                format!("{}{}…", ENC_PREFIX, short)
            }
            ValueView::Plaintext => "*** (plaintext)".to_string(),
        }
    }
}

/// The vault.
pub struct Vault {
    pub(super) identities: IdentityService,
    pub(super) kv: VaultKv,
    pub(super) trust: TrustStore,
    pub(super) audit: AuditLog,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) options: VaultOptions,
    identity: Option<Arc<Identity>>,
    untrusted: bool,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("trust", &self.trust.path())
            .field("audit", &self.audit.path())
            .field("identity", &self.identity)
            .finish()
    }
}

impl Vault {
    pub fn new(ctx: VaultContext, options: VaultOptions) -> Self {
        let kv = VaultKv::new(ctx.sun.clone(), ctx.clock.clone()).gate_writes(options.gate_writes);
        Self {
            identities: IdentityService::new(ctx.sun),
            kv,
            trust: ctx.trust,
            audit: ctx.audit,
            clock: ctx.clock,
            options,
            identity: None,
            untrusted: false,
        }
    }

    pub fn trust_store(&self) -> &TrustStore {
        &self.trust
    }

    /// The account identity, fetched at most once per vault.
    pub(super) fn identity(&mut self) -> Result<Arc<Identity>> {
        if let Some(identity) = &self.identity {
            return Ok(identity.clone());
        }
        let identity = Arc::new(self.identities.load()?);
        self.identity = Some(identity.clone());
        Ok(identity)
    }

    pub(super) fn remember_identity(&mut self, identity: Identity) -> Arc<Identity> {
        let identity = Arc::new(identity);
        self.identity = Some(identity.clone());
        identity
    }

    /// Recipient set of a scope: the identity's recipient.
    pub(super) fn recipients(&mut self) -> Result<Vec<String>> {
        Ok(vec![self.identity()?.recipient()])
    }

    /// Trust gate for mutations. Pins on first use; drift needs
    /// `accept_new_recipients` or, when `prompt` is set, an interactive yes.
    pub(super) fn admit(&mut self, target: &Target, prompt: bool) -> Result<()> {
        let recipients = self.recipients()?;
        let repo = target.repo_key();
        let scope = target.scope.as_str();
        match self.trust.verify(&repo, scope, &recipients) {
            Verdict::Trusted => Ok(()),
            Verdict::Unknown => {
                debug!(scope, "pinning recipients on first use");
                self.trust
                    .upsert(&repo, scope, &fingerprint(&recipients), self.clock.now())
            }
            Verdict::Untrusted { expected, actual } => {
                let admitted = self.options.accept_new_recipients
                    || (prompt
                        && self.ask(&format!(
                            "Recipients for scope {} changed ({} -> {}). Trust the new set?",
                            scope,
                            short(&expected),
                            short(&actual)
                        )));
                if !admitted {
                    return Err(VaultError::TrustViolation {
                        scope: scope.to_string(),
                        expected,
                        actual,
                    }
                    .into());
                }
                warn!(scope, expected = %expected, actual = %actual, "admitting new recipient set");
                self.trust.upsert(&repo, scope, &actual, self.clock.now())
            }
        }
    }

    /// Trust check for reads: drift only warns and marks the audit record.
    pub(super) fn observe(&mut self, target: &Target) -> Result<()> {
        let recipients = self.recipients()?;
        let verdict = self
            .trust
            .verify(&target.repo_key(), target.scope.as_str(), &recipients);
        if let Verdict::Untrusted { expected, actual } = verdict {
            warn!(
                scope = %target.scope,
                expected = %expected,
                actual = %actual,
                "recipient set differs from the trusted fingerprint"
            );
            self.untrusted = true;
        }
        Ok(())
    }

    pub(super) fn ask(&self, prompt: &str) -> bool {
        self.options.confirm.as_ref().is_some_and(|confirm| confirm(prompt))
    }

    /// Decrypt `raw` if it is ciphertext.
    pub(super) fn reveal(&mut self, raw: &str) -> Result<Zeroizing<String>> {
        if cipher::is_encrypted(raw) {
            let identity = self.identity()?;
            return cipher::decrypt(raw, identity.as_age());
        }
        Ok(Zeroizing::new(cipher::normalize(raw)))
    }

    /// Encrypt `value` to the identity unless it already is ciphertext.
    pub(super) fn seal(&mut self, value: &str) -> Result<String> {
        if cipher::is_encrypted(value) {
            return Ok(value.trim().to_string());
        }
        let identity = self.identity()?;
        cipher::encrypt(value, &[identity.recipient_key()])
    }

    /// Write the audit record for a verb and hand back its result.
    pub(super) fn audited<T>(
        &mut self,
        op: &str,
        target: &Target,
        key: Option<&str>,
        result: Result<T>,
    ) -> Result<T> {
        self.record(op, target, key, &result);
        result
    }

    pub(super) fn record<T>(
        &mut self,
        op: &str,
        target: &Target,
        key: Option<&str>,
        result: &Result<T>,
    ) {
        let outcome = match result {
            Ok(_) => Outcome::Ok,
            Err(e) if is_denial(e) => Outcome::Denied,
            Err(_) => Outcome::Error,
        };
        let mut record = Record::new(op, target.scope.as_str(), outcome)
            .source(&self.options.source)
            .extra("repo_root", target.repo_key())
            .extra("user", whoami::username());
        if let Some(key) = key {
            record = record.key(key);
        }
        if std::mem::take(&mut self.untrusted) {
            record = record.extra("untrusted", true);
        }
        if let Err(e) = result {
            record = record
                .extra("error", e.to_string())
                .extra("kind", serde_json::to_value(e.kind()).unwrap_or(Value::Null));
        }
        self.audit.append(record);
    }
}

fn is_denial(e: &Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::TrustViolation | ErrorKind::Unsupported | ErrorKind::PlaintextFound
    ) || matches!(e, Error::Vault(VaultError::ConfirmationRequired(_)))
}

fn short(fp: &str) -> &str {
    &fp[..fp.len().min(12)]
}
