//! Sun object store.
//!
//! Sun keeps `(kind, name)` objects with an opaque payload, a content type,
//! a JSON metadata map, and a per-object revision counter. The vault reads
//! and writes it through the [`SunStore`] trait.
//!
//! ## Implementations
//!
//! - [`HttpSun`]: the real service over HTTPS (`reqwest` blocking client).
//! - [`MemorySun`]: an in-process store with the same revision and
//!   precondition semantics, used by tests and the fake server in the
//!   integration suite.
//!
//! ## Adding a New Backend
//!
//! 1. Implement [`SunStore`] in a new file
//! 2. Map failures onto [`SunError`](crate::error::SunError)
//! 3. Re-export from this module

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

mod http;
mod memory;

pub use http::{HttpOptions, HttpSun};
pub use memory::MemorySun;

/// Object metadata map.
pub type Metadata = serde_json::Map<String, Value>;

/// Listing entry; never carries the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub kind: String,
    pub name: String,
    pub latest_revision: u64,
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// One entry of an object's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRevision {
    pub revision: u64,
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub created_at: String,
}

/// Latest payload of an object together with what describes it.
#[derive(Debug, Clone)]
pub struct ObjectPayload {
    pub payload: Vec<u8>,
    pub content_type: String,
    pub metadata: Metadata,
    pub revision: u64,
}

/// Arguments of [`SunStore::put`].
#[derive(Debug, Clone)]
pub struct PutRequest<'a> {
    pub kind: &'a str,
    pub name: &'a str,
    pub payload: &'a [u8],
    pub content_type: &'a str,
    pub metadata: Metadata,
    /// Required current revision; `Some(0)` means "must not exist yet".
    pub if_match_rev: Option<u64>,
}

/// Object store contract.
pub trait SunStore: Send + Sync {
    /// Write a new revision and return its number.
    ///
    /// # Errors
    ///
    /// `Conflict` when `if_match_rev` does not match, `TooLarge` above the
    /// payload cap, `Unavailable`/`Unauthorized` from the transport.
    fn put(&self, req: PutRequest<'_>) -> Result<u64>;

    /// Latest payload, metadata and revision.
    ///
    /// # Errors
    ///
    /// `NotFound` if the object has never been written.
    fn get_payload(&self, kind: &str, name: &str) -> Result<ObjectPayload>;

    /// Objects of `kind` whose name starts with `prefix`, ordered by name.
    fn list(&self, kind: &str, prefix: &str, limit: usize) -> Result<Vec<ObjectMeta>>;

    /// Revisions of one object, most recent first.
    ///
    /// # Errors
    ///
    /// `NotFound` if the object has never been written.
    fn list_revisions(&self, kind: &str, name: &str, limit: usize)
        -> Result<Vec<ObjectRevision>>;
}

/// Read a boolean flag from metadata, accepting the string spellings
/// other writers use.
pub fn meta_bool(metadata: &Metadata, key: &str) -> bool {
    match metadata.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}

/// `hex(SHA-256(payload))`, the checksum Sun reports for an object.
pub fn checksum(payload: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(payload))
}
