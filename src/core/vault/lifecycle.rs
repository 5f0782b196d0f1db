//! Scope and identity lifecycle.

use age::x25519;
use serde::Serialize;
use tracing::info;
use zeroize::Zeroizing;

use super::secrets::not_found;
use super::Vault;
use crate::core::cipher;
use crate::core::identity::Identity;
use crate::core::scope::Target;
use crate::core::trust::fingerprint;
use crate::error::{Error, Result, VaultError};

/// Result of [`Vault::init`].
#[derive(Debug, Clone, Serialize)]
pub struct InitReport {
    pub scope: String,
    pub recipient: String,
    pub fingerprint: String,
    pub identity_created: bool,
}

/// Result of [`Vault::encrypt`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct EncryptReport {
    pub encrypted: Vec<String>,
    pub already_encrypted: usize,
}

/// Result of a clean [`Vault::check`].
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub scope: String,
    pub keys: usize,
}

/// Result of [`Vault::rotate`].
#[derive(Debug, Clone, Serialize)]
pub struct RotateReport {
    pub recipient: String,
    pub fingerprint: String,
    /// `(scope, re-encrypted keys)` per rotated scope.
    pub scopes: Vec<(String, usize)>,
}

impl Vault {
    /// Make sure the identity exists and pin the scope's recipients.
    ///
    /// Creates the identity when the account has none. Writes no keys.
    ///
    /// # Errors
    ///
    /// `TrustViolation` if the scope is pinned to a different recipient
    /// set and the change is not admitted.
    pub fn init(&mut self, target: &Target) -> Result<InitReport> {
        let result = self.init_inner(target);
        self.audited("init", target, None, result)
    }

    fn init_inner(&mut self, target: &Target) -> Result<InitReport> {
        let identity_created = match self.identities.load() {
            Ok(identity) => {
                self.remember_identity(identity);
                false
            }
            Err(Error::Vault(VaultError::IdentityMissing)) => {
                let identity = self.identities.init(false)?;
                info!(recipient = %identity.recipient(), "vault identity created");
                self.remember_identity(identity);
                true
            }
            Err(e) => return Err(e),
        };

        self.admit(target, true)?;
        let recipients = self.recipients()?;
        Ok(InitReport {
            scope: target.scope.to_string(),
            fingerprint: fingerprint(&recipients),
            recipient: recipients.into_iter().next().unwrap_or_default(),
            identity_created,
        })
    }

    /// Re-write plaintext values of `keys` (all keys when empty) as
    /// ciphertext. Already encrypted values are left alone.
    ///
    /// # Errors
    ///
    /// `NotFound` for a listed key the scope does not have.
    pub fn encrypt(&mut self, target: &Target, keys: &[String]) -> Result<EncryptReport> {
        let result = self.encrypt_inner(target, keys);
        self.audited("encrypt", target, None, result)
    }

    fn encrypt_inner(&mut self, target: &Target, keys: &[String]) -> Result<EncryptReport> {
        self.admit(target, false)?;
        let values = self.kv.load_raw_values(target)?;
        let selected = select(target, &values, keys)?;

        let mut report = EncryptReport::default();
        for (key, raw) in selected {
            if cipher::is_encrypted(raw) {
                report.already_encrypted += 1;
                continue;
            }
            let sealed = self.seal(&cipher::normalize(raw))?;
            self.kv
                .put_raw(target, key, &sealed, &self.options.source, false)?;
            report.encrypted.push(key.to_string());
        }
        info!(
            scope = %target.scope,
            encrypted = report.encrypted.len(),
            skipped = report.already_encrypted,
            "encrypt pass finished"
        );
        Ok(report)
    }

    /// Decrypted `(key, value)` pairs for `keys` (all keys when empty).
    ///
    /// # Errors
    ///
    /// `Unsupported` for `in_place`: there is no local file to rewrite.
    pub fn decrypt(
        &mut self,
        target: &Target,
        keys: &[String],
        in_place: bool,
    ) -> Result<Vec<(String, Zeroizing<String>)>> {
        let result = self.decrypt_inner(target, keys, in_place);
        self.audited("decrypt", target, None, result)
    }

    fn decrypt_inner(
        &mut self,
        target: &Target,
        keys: &[String],
        in_place: bool,
    ) -> Result<Vec<(String, Zeroizing<String>)>> {
        if in_place {
            return Err(VaultError::Unsupported("decrypt --in-place".into()).into());
        }
        self.observe(target)?;
        let values = self.kv.load_raw_values(target)?;
        let mut out = Vec::new();
        for (key, raw) in select(target, &values, keys)? {
            out.push((key.to_string(), self.reveal(raw)?));
        }
        Ok(out)
    }

    /// Flag keys whose stored value is plaintext.
    ///
    /// # Errors
    ///
    /// `PlaintextFound` listing the offending keys.
    pub fn check(&mut self, target: &Target) -> Result<CheckReport> {
        let result = self.check_inner(target);
        self.audited("check", target, None, result)
    }

    fn check_inner(&mut self, target: &Target) -> Result<CheckReport> {
        self.observe(target)?;
        let values = self.kv.load_raw_values(target)?;
        let plaintext: Vec<String> = values
            .iter()
            .filter(|(_, raw)| !cipher::is_encrypted(raw))
            .map(|(key, _)| key.clone())
            .collect();
        if !plaintext.is_empty() {
            return Err(VaultError::PlaintextFound {
                scope: target.scope.to_string(),
                keys: plaintext,
            }
            .into());
        }
        Ok(CheckReport {
            scope: target.scope.to_string(),
            keys: values.len(),
        })
    }

    /// Replace the account identity and re-encrypt every value of
    /// `targets` under the new recipient. Requires `assume_yes`.
    ///
    /// Runs in three passes so that every value stays readable by the
    /// stored identity if any write fails:
    ///
    /// 1. seal each value to both the current and the new recipient
    /// 2. store the new identity, gated on the revision that was loaded,
    ///    and re-pin the listed scopes
    /// 3. seal each value to the new recipient alone
    ///
    /// Values of scopes not listed stay encrypted to the old identity and
    /// become unreadable; their trust pins keep the old fingerprint.
    pub fn rotate(&mut self, targets: &[Target]) -> Result<RotateReport> {
        let result = self.rotate_inner(targets);
        for target in targets {
            self.record("rotate", target, None, &result);
        }
        result
    }

    fn rotate_inner(&mut self, targets: &[Target]) -> Result<RotateReport> {
        if !self.options.assume_yes {
            return Err(VaultError::ConfirmationRequired(
                "identity rotation re-encrypts every listed scope; re-run with --yes".into(),
            )
            .into());
        }

        let mut plain = Vec::with_capacity(targets.len());
        for target in targets {
            self.admit(target, false)?;
            let values = self.kv.load_raw_values(target)?;
            let mut revealed = Vec::with_capacity(values.len());
            for (key, raw) in values {
                let value = self.reveal(&raw)?;
                revealed.push((key, value));
            }
            plain.push(revealed);
        }

        let current = self.identity()?;
        let staged = Identity::generate();
        let both = [current.recipient_key(), staged.recipient_key()];
        self.rewrite(targets, &plain, &both)?;
        info!(
            scopes = targets.len(),
            "values sealed to both identities, swapping"
        );

        let next = self.identities.rotate(&current, staged)?;
        let next = self.remember_identity(next);
        let pinned = fingerprint(&[next.recipient()]);
        for target in targets {
            self.trust.upsert(
                &target.repo_key(),
                target.scope.as_str(),
                &pinned,
                self.clock.now(),
            )?;
        }
        self.rewrite(targets, &plain, &[next.recipient_key()])?;

        let scopes = targets
            .iter()
            .zip(&plain)
            .map(|(target, values)| (target.scope.to_string(), values.len()))
            .collect::<Vec<_>>();

        info!(recipient = %next.recipient(), scopes = scopes.len(), "identity rotated");
        Ok(RotateReport {
            recipient: next.recipient(),
            fingerprint: pinned,
            scopes,
        })
    }

    /// Put every value of `plain` back, sealed to `recipients`.
    fn rewrite(
        &self,
        targets: &[Target],
        plain: &[Vec<(String, Zeroizing<String>)>],
        recipients: &[x25519::Recipient],
    ) -> Result<()> {
        for (target, values) in targets.iter().zip(plain) {
            for (key, value) in values {
                let sealed = cipher::encrypt(value, recipients)?;
                self.kv
                    .put_raw(target, key, &sealed, &self.options.source, false)?;
            }
        }
        Ok(())
    }
}

/// Pick `keys` out of `values`, or everything when `keys` is empty.
fn select<'a>(
    target: &Target,
    values: &'a std::collections::BTreeMap<String, String>,
    keys: &[String],
) -> Result<Vec<(&'a str, &'a str)>> {
    if keys.is_empty() {
        return Ok(values
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect());
    }
    keys.iter()
        .map(|key| {
            values
                .get_key_value(key.as_str())
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .ok_or_else(|| not_found(target, key))
        })
        .collect()
}
