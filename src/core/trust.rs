//! Trust anchor.
//!
//! Each `(repo_root, scope)` pins the fingerprint of the recipient set it
//! last accepted. A different fingerprint on a later access means the
//! recipients changed underneath us.
//!
//! The store is a small JSON file (`~/.si/vault/trust.json` by default),
//! rewritten atomically on every change.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::core::constants::SCHEMA_VERSION;
use crate::error::Result;

/// Sorted, de-duplicated, trimmed recipients.
pub fn canonical(recipients: &[String]) -> Vec<String> {
    let mut out: Vec<String> = recipients
        .iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// `hex(SHA-256(join("\n", sorted_unique(recipients))))`.
pub fn fingerprint(recipients: &[String]) -> String {
    let joined = canonical(recipients).join("\n");
    hex::encode(Sha256::digest(joined.as_bytes()))
}

/// Outcome of [`TrustStore::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Trusted,
    Untrusted { expected: String, actual: String },
    Unknown,
}

/// One pinned fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustEntry {
    pub repo_root: String,
    pub scope: String,
    pub fingerprint: String,
    pub trusted_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TrustFile {
    schema_version: u32,
    #[serde(default)]
    entries: Vec<TrustEntry>,
}

/// The local trust store.
#[derive(Debug)]
pub struct TrustStore {
    path: PathBuf,
    file: TrustFile,
}

impl TrustStore {
    /// Open the store at `path`; a missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            TrustFile {
                schema_version: SCHEMA_VERSION,
                entries: Vec::new(),
            }
        };
        debug!(path = %path.display(), entries = file.entries.len(), "trust store opened");
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The entry pinned for `(repo_root, scope)`.
    pub fn entry(&self, repo_root: &str, scope: &str) -> Option<&TrustEntry> {
        self.file
            .entries
            .iter()
            .find(|e| e.repo_root == repo_root && e.scope == scope)
    }

    /// Compare `recipients` against the pinned fingerprint.
    pub fn verify(&self, repo_root: &str, scope: &str, recipients: &[String]) -> Verdict {
        let actual = fingerprint(recipients);
        match self.entry(repo_root, scope) {
            None => Verdict::Unknown,
            Some(e) if e.fingerprint == actual => Verdict::Trusted,
            Some(e) => Verdict::Untrusted {
                expected: e.fingerprint.clone(),
                actual,
            },
        }
    }

    /// Pin `fingerprint` for `(repo_root, scope)` and persist.
    pub fn upsert(
        &mut self,
        repo_root: &str,
        scope: &str,
        fingerprint: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let entry = TrustEntry {
            repo_root: repo_root.to_string(),
            scope: scope.to_string(),
            fingerprint: fingerprint.to_string(),
            trusted_at: at,
        };
        match self
            .file
            .entries
            .iter_mut()
            .find(|e| e.repo_root == repo_root && e.scope == scope)
        {
            Some(existing) => *existing = entry,
            None => self.file.entries.push(entry),
        }
        self.file
            .entries
            .sort_by(|a, b| (&a.repo_root, &a.scope).cmp(&(&b.repo_root, &b.scope)));
        self.save()?;
        info!(scope, fingerprint, "trust pinned");
        Ok(())
    }

    /// Drop the entry for `(repo_root, scope)`. Returns whether one existed.
    pub fn forget(&mut self, repo_root: &str, scope: &str) -> Result<bool> {
        let before = self.file.entries.len();
        self.file
            .entries
            .retain(|e| !(e.repo_root == repo_root && e.scope == scope));
        if self.file.entries.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    fn save(&mut self) -> Result<()> {
        self.file.schema_version = SCHEMA_VERSION;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        create_private_dir(&dir)?;

        let mut body = serde_json::to_vec_pretty(&self.file)?;
        body.push(b'\n');
        write_private(&self.path, &body)?;

        debug!(path = %self.path.display(), "trust store saved");
        Ok(())
    }
}

/// Replace `path` with `body` atomically: a 0600 temp file in the same
/// directory, synced, then renamed over `path`.
pub(crate) fn write_private(path: &Path, body: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    tmp.write_all(body)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create `dir` (and parents) with mode 0700 on Unix.
pub(crate) fn create_private_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(dir)?;
    }
    #[cfg(not(unix))]
    {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
