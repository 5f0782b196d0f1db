//! Audit log.
//!
//! Append-only JSON lines, one record per terminal outcome of a vault verb.
//! Nothing reads the log back; write failures are reported with `warn!` and
//! never fail the command.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{trace, warn};

use crate::core::clock::{rfc3339_nanos, Clock};
use crate::core::constants::SOURCE_CLI;
use crate::core::sun::Metadata;
use crate::core::trust::create_private_dir;
use crate::error::Result;

/// How a verb ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Ok,
    Denied,
    Error,
}

/// One audit line.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub ts: String,
    pub op: String,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub outcome: Outcome,
    pub source: String,
    pub extra: Metadata,
}

impl Record {
    pub fn new(op: &str, scope: &str, outcome: Outcome) -> Self {
        Self {
            ts: String::new(),
            op: op.to_string(),
            scope: scope.to_string(),
            key: None,
            outcome,
            source: SOURCE_CLI.to_string(),
            extra: Metadata::new(),
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    pub fn extra(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(name.to_string(), value.into());
        self
    }
}

/// The log file. A disabled log drops every record.
pub struct AuditLog {
    path: Option<PathBuf>,
    clock: Arc<dyn Clock>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: Some(path.into()),
            clock,
        }
    }

    pub fn disabled(clock: Arc<dyn Clock>) -> Self {
        Self { path: None, clock }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Stamp and append `record`.
    pub fn append(&self, mut record: Record) {
        let Some(path) = &self.path else {
            return;
        };
        record.ts = rfc3339_nanos(self.clock.now());
        match write_record(path, &record) {
            Ok(()) => trace!(op = %record.op, outcome = ?record.outcome, "audit record written"),
            Err(e) => warn!(path = %path.display(), "failed to write audit record: {}", e),
        }
    }
}

fn write_record(path: &Path, record: &Record) -> Result<()> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_private_dir(dir)?;
    }

    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');

    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(&line)?;
    file.sync_all()?;
    Ok(())
}
