//! Vault KV adapter.
//!
//! Maps `(scope, key)` onto Sun objects: one kind per scope, one object per
//! key, one revision per write. Deletes are tombstones (a revision with
//! `deleted=true` and an empty payload), so history survives them.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::core::clock::{rfc3339_nanos, Clock};
use crate::core::constants::{
    KIND_SUFFIX_LEN, KV_KIND_PREFIX, KV_LIST_LIMIT, MAX_KIND_LEN, PAYLOAD_CONTENT_TYPE,
    SCHEMA_VERSION,
};
use crate::core::dotenv::Document;
use crate::core::scope::{Scope, Target};
use crate::core::sun::{meta_bool, Metadata, ObjectMeta, ObjectRevision, PutRequest, SunStore};
use crate::core::validation::validate_key;
use crate::error::{Error, Result, SunError};

/// Sun kind holding the keys of `scope`.
///
/// `vault_kv.` followed by the scope with `/` turned into `.`. A kind that
/// would exceed [`MAX_KIND_LEN`] is truncated and suffixed with 16 hex
/// characters of SHA-256(scope).
pub fn kind_for_scope(scope: &Scope) -> String {
    kind_for_normalized(scope.as_str())
}

fn kind_for_normalized(scope: &str) -> String {
    let human = scope.replace('/', ".");
    let kind = format!("{}{}", KV_KIND_PREFIX, human);
    if kind.len() <= MAX_KIND_LEN {
        return kind;
    }

    let digest = hex::encode(Sha256::digest(scope.as_bytes()));
    let suffix = &digest[..KIND_SUFFIX_LEN];
    let budget = MAX_KIND_LEN - KV_KIND_PREFIX.len() - 1 - KIND_SUFFIX_LEN;
    let human = human[..budget.min(human.len())].trim_matches(&['-', '_', '.', ':'][..]);
    if human.is_empty() {
        return format!("{}{}", KV_KIND_PREFIX, suffix);
    }
    format!("{}{}.{}", KV_KIND_PREFIX, human, suffix)
}

fn short_hash(input: &str) -> String {
    hex::encode(&Sha256::digest(input.as_bytes())[..8])
}

/// `(repo_hash, file_hash)` recorded in KV metadata.
pub fn target_hashes(target: &Target) -> (String, String) {
    (
        short_hash(target.repo_key().trim()),
        short_hash(target.scope.as_str()),
    )
}

/// Kind of write recorded in metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Set,
    Unset,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Operation::Set => "set",
            Operation::Unset => "unset",
        })
    }
}

/// Metadata attached to every KV revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvMetadata {
    pub version: u32,
    pub scope: String,
    pub repo_hash: String,
    pub file_hash: String,
    pub key: String,
    pub operation: Operation,
    pub deleted: bool,
    pub changed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub allow_empty: bool,
}

impl KvMetadata {
    fn into_map(self) -> Result<Metadata> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(SunError::Protocol(format!("metadata is not an object: {}", other)).into()),
        }
    }
}

/// One row of `si vault history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub revision: u64,
    pub changed_at: String,
    pub operation: String,
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl From<&ObjectRevision> for HistoryEntry {
    fn from(rev: &ObjectRevision) -> Self {
        let text = |key: &str| rev.metadata.get(key).and_then(Value::as_str).map(String::from);
        Self {
            revision: rev.revision,
            changed_at: text("changed_at").unwrap_or_else(|| rev.created_at.clone()),
            operation: text("operation").unwrap_or_else(|| "set".to_string()),
            deleted: meta_bool(&rev.metadata, "deleted"),
            value_sha256: text("value_sha256"),
            source: text("source"),
        }
    }
}

/// Result of [`VaultKv::mirror_document`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MirrorReport {
    pub pushed: usize,
    pub tombstoned: usize,
}

/// The adapter.
pub struct VaultKv {
    sun: Arc<dyn SunStore>,
    clock: Arc<dyn Clock>,
    gate_writes: bool,
    last_stamp: Mutex<Option<DateTime<Utc>>>,
}

impl VaultKv {
    pub fn new(sun: Arc<dyn SunStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sun,
            clock,
            gate_writes: false,
            last_stamp: Mutex::new(None),
        }
    }

    /// Send `if_match_rev` on every write.
    pub fn gate_writes(mut self, gate: bool) -> Self {
        self.gate_writes = gate;
        self
    }

    /// Every live key of the target and its raw stored value.
    pub fn load_raw_values(&self, target: &Target) -> Result<BTreeMap<String, String>> {
        let kind = kind_for_scope(&target.scope);
        let items = self.list_keys(&kind)?;

        let mut values = BTreeMap::new();
        for item in items {
            let key = item.name.trim();
            if key.is_empty() || meta_bool(&item.metadata, "deleted") {
                continue;
            }
            let object = self.sun.get_payload(&kind, key)?;
            if meta_bool(&object.metadata, "deleted") {
                continue;
            }
            let raw = payload_text(&object.payload);
            if raw.is_empty() && !meta_bool(&object.metadata, "allow_empty") {
                continue;
            }
            values.insert(key.to_string(), raw);
        }
        debug!(kind, keys = values.len(), "loaded raw values");
        Ok(values)
    }

    /// Raw stored value of one key; `None` when absent or tombstoned.
    pub fn get_raw(&self, target: &Target, key: &str) -> Result<Option<String>> {
        let kind = kind_for_scope(&target.scope);
        let object = match self.sun.get_payload(&kind, key) {
            Ok(object) => object,
            Err(Error::Sun(SunError::NotFound { .. })) => return Ok(None),
            Err(e) => return Err(e),
        };
        if meta_bool(&object.metadata, "deleted") {
            return Ok(None);
        }
        let raw = payload_text(&object.payload);
        if raw.is_empty() && !meta_bool(&object.metadata, "allow_empty") {
            return Ok(None);
        }
        Ok(Some(raw))
    }

    /// Write one revision. With `deleted`, writes a tombstone and ignores
    /// `raw`. Returns the new revision.
    pub fn put_raw(
        &self,
        target: &Target,
        key: &str,
        raw: &str,
        source: &str,
        deleted: bool,
    ) -> Result<u64> {
        validate_key(key)?;
        let kind = kind_for_scope(&target.scope);
        let (repo_hash, file_hash) = target_hashes(target);

        let payload: Vec<u8> = if deleted {
            Vec::new()
        } else {
            format!("{}\n", raw).into_bytes()
        };
        let source = source.trim();
        let metadata = KvMetadata {
            version: SCHEMA_VERSION,
            scope: target.scope.to_string(),
            repo_hash,
            file_hash,
            key: key.to_string(),
            operation: if deleted {
                Operation::Unset
            } else {
                Operation::Set
            },
            deleted,
            changed_at: rfc3339_nanos(self.stamp()),
            value_sha256: (!deleted).then(|| hex::encode(Sha256::digest(&payload))),
            source: (!source.is_empty()).then(|| source.to_string()),
            allow_empty: !deleted && raw.is_empty(),
        }
        .into_map()?;

        let mut attempt = 0;
        loop {
            let if_match_rev = if self.gate_writes {
                Some(self.current_revision(&kind, key)?)
            } else {
                None
            };
            let result = self.sun.put(PutRequest {
                kind: &kind,
                name: key,
                payload: &payload,
                content_type: PAYLOAD_CONTENT_TYPE,
                metadata: metadata.clone(),
                if_match_rev,
            });
            match result {
                Err(Error::Sun(SunError::Conflict { .. })) if attempt == 0 => {
                    debug!(kind, key, "revision conflict, retrying once");
                    attempt += 1;
                }
                Ok(revision) => {
                    info!(kind, key, revision, deleted, "kv write");
                    return Ok(revision);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Make the remote match `doc`: upsert every entry, tombstone every
    /// live remote key the document lacks.
    pub fn mirror_document(
        &self,
        target: &Target,
        doc: &Document,
        source: &str,
    ) -> Result<MirrorReport> {
        let mut report = MirrorReport::default();
        let local: BTreeMap<&str, &str> = doc
            .entries()
            .into_iter()
            .map(|e| (e.key(), e.value()))
            .collect();
        for key in local.keys() {
            validate_key(key)?;
        }

        for (key, value) in &local {
            self.put_raw(target, key, value, source, false)?;
            report.pushed += 1;
        }

        let kind = kind_for_scope(&target.scope);
        for item in self.list_keys(&kind)? {
            let key = item.name.trim();
            if key.is_empty()
                || local.contains_key(key)
                || meta_bool(&item.metadata, "deleted")
            {
                continue;
            }
            self.put_raw(target, key, "", source, true)?;
            report.tombstoned += 1;
        }

        info!(
            scope = %target.scope,
            pushed = report.pushed,
            tombstoned = report.tombstoned,
            "mirrored document"
        );
        Ok(report)
    }

    /// Revisions of one key, most recent first.
    pub fn list_history(
        &self,
        target: &Target,
        key: &str,
        limit: usize,
    ) -> Result<Vec<ObjectRevision>> {
        self.sun
            .list_revisions(&kind_for_scope(&target.scope), key, limit)
    }

    /// Objects of `kind` up to [`KV_LIST_LIMIT`].
    fn list_keys(&self, kind: &str) -> Result<Vec<ObjectMeta>> {
        let items = self.sun.list(kind, "", KV_LIST_LIMIT)?;
        if items.len() >= KV_LIST_LIMIT {
            warn!(
                kind,
                limit = KV_LIST_LIMIT,
                "scope holds at least {} keys; keys past the limit are ignored",
                KV_LIST_LIMIT
            );
        }
        Ok(items)
    }

    fn current_revision(&self, kind: &str, key: &str) -> Result<u64> {
        Ok(self
            .sun
            .list(kind, key, 0)?
            .into_iter()
            .find(|m| m.name == key)
            .map(|m| m.latest_revision)
            .unwrap_or(0))
    }

    /// Strictly increasing `changed_at` for writes through this adapter.
    fn stamp(&self) -> DateTime<Utc> {
        let mut last = self
            .last_stamp
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut now = self.clock.now();
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + Duration::nanoseconds(1);
            }
        }
        *last = Some(now);
        now
    }
}

fn payload_text(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    text.strip_suffix('\n')
        .map(|t| t.strip_suffix('\r').unwrap_or(t))
        .unwrap_or(&*text)
        .to_string()
}
