//! Key operations.

use tracing::{info, warn};

use super::{Vault, ValueView};
use crate::core::cipher;
use crate::core::kv::HistoryEntry;
use crate::core::scope::Target;
use crate::core::validation::{validate_key, validate_value};
use crate::error::{Error, Result, SunError, ValidationError, VaultError};

impl Vault {
    /// Store `value` under `key`, encrypting it unless it already is an
    /// `enc:v1:` ciphertext. Returns the new revision.
    ///
    /// # Errors
    ///
    /// `InvalidKey`, `IdentityMissing`, `TrustViolation`, transport errors.
    pub fn set(&mut self, target: &Target, key: &str, value: &str) -> Result<u64> {
        let result = self.set_inner(target, key, value);
        self.audited("set", target, Some(key), result)
    }

    fn set_inner(&mut self, target: &Target, key: &str, value: &str) -> Result<u64> {
        validate_key(key)?;
        validate_value(key, value)?;
        self.admit(target, false)?;

        let sealed = self.seal(value)?;
        let revision = self
            .kv
            .put_raw(target, key, &sealed, &self.options.source, false)?;
        info!(scope = %target.scope, key, revision, "value set");
        Ok(revision)
    }

    /// Read `key`. With `reveal`, ciphertext is decrypted; otherwise the
    /// value stays masked.
    ///
    /// # Errors
    ///
    /// `NotFound` when the key is absent or tombstoned.
    pub fn get(&mut self, target: &Target, key: &str, reveal: bool) -> Result<ValueView> {
        let result = self.get_inner(target, key, reveal);
        let op = if reveal { "reveal" } else { "get" };
        self.audited(op, target, Some(key), result)
    }

    fn get_inner(&mut self, target: &Target, key: &str, reveal: bool) -> Result<ValueView> {
        validate_key(key)?;
        self.observe(target)?;
        let raw = self
            .kv
            .get_raw(target, key)?
            .ok_or_else(|| not_found(target, key))?;
        self.view(key, &raw, reveal)
    }

    /// Tombstone `key`. Returns the tombstone's revision.
    ///
    /// # Errors
    ///
    /// `NotFound` when there is nothing live to delete.
    pub fn unset(&mut self, target: &Target, key: &str) -> Result<u64> {
        let result = self.unset_inner(target, key);
        self.audited("unset", target, Some(key), result)
    }

    fn unset_inner(&mut self, target: &Target, key: &str) -> Result<u64> {
        validate_key(key)?;
        self.admit(target, false)?;
        if self.kv.get_raw(target, key)?.is_none() {
            return Err(not_found(target, key));
        }
        let revision = self
            .kv
            .put_raw(target, key, "", &self.options.source, true)?;
        info!(scope = %target.scope, key, revision, "value unset");
        Ok(revision)
    }

    /// Every live key of the scope, sorted.
    pub fn list(&mut self, target: &Target, reveal: bool) -> Result<Vec<(String, ValueView)>> {
        let result = self.list_inner(target, reveal);
        self.audited("list", target, None, result)
    }

    fn list_inner(&mut self, target: &Target, reveal: bool) -> Result<Vec<(String, ValueView)>> {
        self.observe(target)?;
        let values = self.kv.load_raw_values(target)?;
        let mut out = Vec::with_capacity(values.len());
        for (key, raw) in values {
            let view = self.view(&key, &raw, reveal)?;
            out.push((key, view));
        }
        Ok(out)
    }

    /// Revisions of `key`, most recent first, tombstones included.
    ///
    /// # Errors
    ///
    /// `Usage` for a zero limit, `NotFound` for a key never written.
    pub fn history(
        &mut self,
        target: &Target,
        key: &str,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>> {
        let result = self.history_inner(target, key, limit);
        self.audited("history", target, Some(key), result)
    }

    fn history_inner(
        &mut self,
        target: &Target,
        key: &str,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>> {
        validate_key(key)?;
        if limit == 0 {
            return Err(ValidationError::Usage("--limit must be greater than zero".into()).into());
        }
        match self.kv.list_history(target, key, limit) {
            Ok(revisions) => Ok(revisions.iter().map(HistoryEntry::from).collect()),
            Err(Error::Sun(SunError::NotFound { .. })) => Err(not_found(target, key)),
            Err(e) => Err(e),
        }
    }

    fn view(&mut self, key: &str, raw: &str, reveal: bool) -> Result<ValueView> {
        let encrypted = cipher::is_encrypted(raw);
        if !encrypted {
            warn!(key, "value is stored as plaintext");
        }
        if reveal {
            Ok(ValueView::Revealed(self.reveal(raw)?))
        } else if encrypted {
            Ok(ValueView::Encrypted(raw.trim().to_string()))
        } else {
            Ok(ValueView::Plaintext)
        }
    }
}

pub(super) fn not_found(target: &Target, key: &str) -> Error {
    VaultError::NotFound {
        scope: target.scope.to_string(),
        key: key.to_string(),
    }
    .into()
}
