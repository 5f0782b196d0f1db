//! `dump`, `import`, `run`.

use std::io::{self, Write};
use std::path::Path;
use std::process::Command;

use serde_json::json;
use tracing::debug;

use super::Session;
use crate::cli::output;
use crate::core::dotenv::Document;
use crate::error::{Result, ValidationError};

pub(super) fn dump(s: &mut Session) -> Result<()> {
    let doc = s.vault.dump(&s.target)?;
    if s.json {
        let map: serde_json::Map<String, serde_json::Value> = doc
            .entries()
            .iter()
            .map(|e| (e.key().to_string(), json!(e.value())))
            .collect();
        return output::json(&json!({
            "scope": s.target.scope.as_str(),
            "recipients": doc.header_recipients(),
            "values": map,
        }));
    }
    io::stdout().write_all(&doc.bytes())?;
    Ok(())
}

pub(super) fn import(s: &mut Session, path: &Path, mirror: bool) -> Result<()> {
    let bytes = std::fs::read(path)?;
    let doc = Document::parse(&bytes)?;
    debug!(path = %path.display(), entries = doc.entries().len(), "parsed dotenv file");
    let report = s.vault.import(&s.target, &doc, mirror)?;

    if s.json {
        return output::json(&report);
    }
    output::success(&format!(
        "imported {} key(s) into {}",
        report.pushed, s.target.display
    ));
    if mirror {
        output::kv("tombstoned", report.tombstoned);
    }
    Ok(())
}

/// Spawn `command` with the scope's values in its environment. Returns the
/// child's exit code.
pub(super) fn run(s: &mut Session, allow_plaintext: bool, command: &[String]) -> Result<i32> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| ValidationError::Usage("no command specified".into()))?;
    let env = s.vault.run_env(&s.target, allow_plaintext)?;

    let mut cmd = Command::new(program);
    cmd.args(args);
    for (key, value) in &env {
        cmd.env(key, value.as_str());
    }
    debug!(program = %program, vars = env.len(), "spawning child");
    let status = cmd.status()?;
    Ok(status.code().unwrap_or(1))
}
