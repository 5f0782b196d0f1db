//! In-memory Sun store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use super::{
    checksum, Metadata, ObjectMeta, ObjectPayload, ObjectRevision, PutRequest, SunStore,
};
use crate::core::clock::{rfc3339_nanos, Clock, SystemClock};
use crate::core::constants::DEFAULT_PAYLOAD_CAP;
use crate::error::{Result, SunError};

#[derive(Debug, Clone)]
struct Revision {
    revision: u64,
    payload: Vec<u8>,
    content_type: String,
    metadata: Metadata,
    created_at: String,
}

type Objects = BTreeMap<(String, String), Vec<Revision>>;

/// A Sun store held in process memory.
///
/// Clones share the same objects, so a test can keep a handle while the
/// vault owns another.
#[derive(Clone)]
pub struct MemorySun {
    objects: Arc<Mutex<Objects>>,
    clock: Arc<dyn Clock>,
    cap: usize,
}

impl std::fmt::Debug for MemorySun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySun")
            .field("objects", &self.lock().len())
            .field("cap", &self.cap)
            .finish()
    }
}

impl Default for MemorySun {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySun {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            objects: Arc::new(Mutex::new(BTreeMap::new())),
            clock,
            cap: DEFAULT_PAYLOAD_CAP,
        }
    }

    /// Override the payload cap.
    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Objects> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn not_found(kind: &str, name: &str) -> SunError {
    SunError::NotFound {
        kind: kind.to_string(),
        name: name.to_string(),
    }
}

impl SunStore for MemorySun {
    fn put(&self, req: PutRequest<'_>) -> Result<u64> {
        if req.payload.len() > self.cap {
            return Err(SunError::TooLarge {
                size: req.payload.len(),
                cap: self.cap,
            }
            .into());
        }

        let mut objects = self.lock();
        let id = (req.kind.to_string(), req.name.to_string());
        let current = objects
            .get(&id)
            .and_then(|h| h.last())
            .map(|r| r.revision)
            .unwrap_or(0);

        if let Some(expected) = req.if_match_rev {
            if expected != current {
                return Err(SunError::Conflict {
                    kind: req.kind.to_string(),
                    name: req.name.to_string(),
                    detail: format!("expected revision {}, found {}", expected, current),
                }
                .into());
            }
        }

        let revision = current + 1;
        objects.entry(id).or_default().push(Revision {
            revision,
            payload: req.payload.to_vec(),
            content_type: req.content_type.to_string(),
            metadata: req.metadata,
            created_at: rfc3339_nanos(self.clock.now()),
        });
        trace!(kind = req.kind, name = req.name, revision, "memory put");
        Ok(revision)
    }

    fn get_payload(&self, kind: &str, name: &str) -> Result<ObjectPayload> {
        let objects = self.lock();
        let latest = objects
            .get(&(kind.to_string(), name.to_string()))
            .and_then(|h| h.last())
            .ok_or_else(|| not_found(kind, name))?;
        Ok(ObjectPayload {
            payload: latest.payload.clone(),
            content_type: latest.content_type.clone(),
            metadata: latest.metadata.clone(),
            revision: latest.revision,
        })
    }

    fn list(&self, kind: &str, prefix: &str, limit: usize) -> Result<Vec<ObjectMeta>> {
        let objects = self.lock();
        let items = objects
            .iter()
            .filter(|((k, n), _)| k == kind && n.starts_with(prefix))
            .filter_map(|((k, n), history)| {
                let first = history.first()?;
                let latest = history.last()?;
                Some(ObjectMeta {
                    kind: k.clone(),
                    name: n.clone(),
                    latest_revision: latest.revision,
                    checksum: checksum(&latest.payload),
                    content_type: latest.content_type.clone(),
                    size_bytes: latest.payload.len() as u64,
                    metadata: latest.metadata.clone(),
                    created_at: first.created_at.clone(),
                    updated_at: latest.created_at.clone(),
                })
            })
            .take(if limit == 0 { usize::MAX } else { limit })
            .collect();
        Ok(items)
    }

    fn list_revisions(
        &self,
        kind: &str,
        name: &str,
        limit: usize,
    ) -> Result<Vec<ObjectRevision>> {
        let objects = self.lock();
        let history = objects
            .get(&(kind.to_string(), name.to_string()))
            .filter(|h| !h.is_empty())
            .ok_or_else(|| not_found(kind, name))?;
        Ok(history
            .iter()
            .rev()
            .take(if limit == 0 { usize::MAX } else { limit })
            .map(|r| ObjectRevision {
                revision: r.revision,
                checksum: checksum(&r.payload),
                content_type: r.content_type.clone(),
                size_bytes: r.payload.len() as u64,
                metadata: r.metadata.clone(),
                created_at: r.created_at.clone(),
            })
            .collect())
    }
}
