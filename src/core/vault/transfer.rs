//! Moving a scope in and out of dotenv form.

use tracing::{info, warn};
use zeroize::Zeroizing;

use super::Vault;
use crate::core::cipher;
use crate::core::constants::{SOURCE_CLI, SOURCE_MIRROR};
use crate::core::dotenv::{Document, SetOptions};
use crate::core::kv::MirrorReport;
use crate::core::scope::Target;
use crate::error::{Result, VaultError};

impl Vault {
    /// The scope as a dotenv document: canonical header, then every key
    /// with its stored value verbatim. Nothing is decrypted.
    pub fn dump(&mut self, target: &Target) -> Result<Document> {
        let result = self.dump_inner(target);
        self.audited("dump", target, None, result)
    }

    fn dump_inner(&mut self, target: &Target) -> Result<Document> {
        self.observe(target)?;
        let recipients = self.recipients()?;
        let values = self.kv.load_raw_values(target)?;

        let mut doc = Document::new();
        for (key, raw) in &values {
            doc.set(key, raw, SetOptions::default())?;
        }
        doc.ensure_header(&recipients);
        Ok(doc)
    }

    /// Push a local document into the scope, encrypting plaintext values.
    ///
    /// With `mirror`, remote keys missing from `doc` are tombstoned.
    pub fn import(&mut self, target: &Target, doc: &Document, mirror: bool) -> Result<MirrorReport> {
        let result = self.import_inner(target, doc, mirror);
        let op = if mirror { "import.mirror" } else { "import" };
        self.audited(op, target, None, result)
    }

    fn import_inner(
        &mut self,
        target: &Target,
        doc: &Document,
        mirror: bool,
    ) -> Result<MirrorReport> {
        self.admit(target, false)?;

        let mut sealed = Document::new();
        for entry in doc.entries() {
            let value = self.seal(entry.value())?;
            sealed.set(entry.key(), &value, SetOptions::default())?;
        }

        if mirror {
            if self.options.source == SOURCE_CLI {
                self.options.source = SOURCE_MIRROR.to_string();
            }
            return self.kv.mirror_document(target, &sealed, SOURCE_MIRROR);
        }

        let mut report = MirrorReport::default();
        for entry in sealed.entries() {
            self.kv
                .put_raw(target, entry.key(), entry.value(), &self.options.source, false)?;
            report.pushed += 1;
        }
        info!(scope = %target.scope, pushed = report.pushed, "document imported");
        Ok(report)
    }

    /// Decrypted environment for a child process.
    ///
    /// # Errors
    ///
    /// `PlaintextFound` when the scope holds plaintext values and
    /// `allow_plaintext` is off.
    pub fn run_env(
        &mut self,
        target: &Target,
        allow_plaintext: bool,
    ) -> Result<Vec<(String, Zeroizing<String>)>> {
        let result = self.run_env_inner(target, allow_plaintext);
        self.audited("run", target, None, result)
    }

    fn run_env_inner(
        &mut self,
        target: &Target,
        allow_plaintext: bool,
    ) -> Result<Vec<(String, Zeroizing<String>)>> {
        self.observe(target)?;
        let values = self.kv.load_raw_values(target)?;
        let plaintext: Vec<String> = values
            .iter()
            .filter(|(_, raw)| !cipher::is_encrypted(raw))
            .map(|(key, _)| key.clone())
            .collect();
        if !plaintext.is_empty() {
            if !allow_plaintext {
                return Err(VaultError::PlaintextFound {
                    scope: target.scope.to_string(),
                    keys: plaintext,
                }
                .into());
            }
            warn!(keys = %plaintext.join(", "), "running with plaintext values");
        }

        let mut env = Vec::with_capacity(values.len());
        for (key, raw) in values {
            let value = self.reveal(&raw)?;
            env.push((key, value));
        }
        Ok(env)
    }
}
