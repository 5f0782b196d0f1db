//! Scope resolution.
//!
//! A scope is a normalized namespace (`[-a-z0-9_.:/]`, at most
//! [`MAX_SCOPE_LEN`] bytes). Scopes containing `/` are namespaced, e.g.
//! `repo/env`.
//!
//! Selection precedence: `--scope` > `--file` (deprecated) > configured
//! default > `"default"`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::core::constants::{DEFAULT_SCOPE, MAX_SCOPE_LEN};
use crate::error::{Error, Result, ValidationError};

const TRIM: &[char] = &['-', '_', '/', '.', ':'];

/// A normalized scope name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope(String);

impl Scope {
    /// Normalize and validate a scope name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScope` if a component holds characters outside
    /// `[-a-z0-9_.:]` (after lowercasing).
    pub fn parse(raw: &str) -> Result<Self> {
        normalize(raw).map(Scope)
    }

    /// Derive a scope from a legacy dotenv path: `.env.prod` -> `prod`,
    /// `config/staging.env` -> `staging`, `.env` -> `default`.
    pub fn from_legacy_file(raw: &str) -> Result<Self> {
        let lowered = raw.trim().to_lowercase().replace('\\', "/");
        if !looks_like_path(&lowered) {
            return Self::parse(&lowered);
        }
        let base = lowered.rsplit('/').next().unwrap_or("").trim();
        let stem = match base {
            "" | "." | ".." | ".env" | "default.env" => return Ok(Self::default()),
            b if b.starts_with(".env.") => &b[".env.".len()..],
            b if b.ends_with(".env") => &b[..b.len() - ".env".len()],
            b => b.trim_start_matches('.'),
        };
        Self::parse(stem)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the scope is namespaced (`repo/env`).
    pub fn is_namespaced(&self) -> bool {
        self.0.contains('/')
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope(DEFAULT_SCOPE.to_string())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Scope::parse(s)
    }
}

fn invalid(raw: &str, reason: impl Into<String>) -> Error {
    ValidationError::InvalidScope {
        scope: raw.to_string(),
        reason: reason.into(),
    }
    .into()
}

/// Normalize a scope string.
pub fn normalize(raw: &str) -> Result<String> {
    let lowered = raw.trim().to_lowercase().replace('\\', "/");
    let mut parts = Vec::new();
    for part in lowered.split('/') {
        let part = part.trim();
        if part.is_empty() || part == "." || part == ".." {
            continue;
        }
        if let Some(bad) = part
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || "-_.:".contains(*c)))
        {
            return Err(invalid(
                raw,
                format!("character '{}' is not allowed (expected [-a-z0-9_.:/])", bad),
            ));
        }
        let part = part.trim_matches(TRIM);
        if !part.is_empty() {
            parts.push(part);
        }
    }

    let mut scope = parts.join("/").trim_matches(TRIM).to_string();
    if scope.len() > MAX_SCOPE_LEN {
        scope = scope[..MAX_SCOPE_LEN].trim_matches(TRIM).to_string();
    }
    if scope.is_empty() {
        return Ok(DEFAULT_SCOPE.to_string());
    }
    Ok(scope)
}

fn looks_like_path(lowered: &str) -> bool {
    if lowered.starts_with('/') || lowered.starts_with('~') {
        return true;
    }
    let bytes = lowered.as_bytes();
    if bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/' {
        return true;
    }
    let base = lowered.rsplit('/').next().unwrap_or("");
    base == ".env" || base == "default.env" || base.starts_with(".env.") || base.ends_with(".env")
}

/// Where the selected scope came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeSource {
    Flag,
    File,
    Settings,
    Ambient,
}

/// Raw scope selectors, in precedence order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeInputs<'a> {
    pub scope: Option<&'a str>,
    pub file: Option<&'a str>,
    pub configured: Option<&'a str>,
}

/// A resolved vault target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scope: Scope,
    /// Enclosing repository root, or the home directory outside a repo.
    pub repo_root: PathBuf,
    /// Human-readable description for output.
    pub display: String,
    pub source: ScopeSource,
}

impl Target {
    /// Target for an explicit scope, outside any repository context.
    pub fn new(scope: Scope, repo_root: impl Into<PathBuf>) -> Self {
        let display = scope.to_string();
        Self {
            scope,
            repo_root: repo_root.into(),
            display,
            source: ScopeSource::Flag,
        }
    }

    /// `repo_root` as the string used for trust keys and hashing.
    pub fn repo_key(&self) -> String {
        self.repo_root.display().to_string()
    }
}

/// Pick a target from the inputs, `cwd` and `home`.
///
/// # Errors
///
/// Returns `InvalidScope` if the selected input does not normalize.
pub fn resolve(inputs: ScopeInputs<'_>, cwd: &Path, home: &Path) -> Result<Target> {
    let (scope, source) = if let Some(raw) = non_blank(inputs.scope) {
        (Scope::parse(raw)?, ScopeSource::Flag)
    } else if let Some(raw) = non_blank(inputs.file) {
        (Scope::from_legacy_file(raw)?, ScopeSource::File)
    } else if let Some(raw) = non_blank(inputs.configured) {
        (Scope::parse(raw)?, ScopeSource::Settings)
    } else {
        (Scope::default(), ScopeSource::Ambient)
    };

    let repo_root = repo_root(cwd).unwrap_or_else(|| home.to_path_buf());
    let display = match source {
        ScopeSource::Flag => scope.to_string(),
        ScopeSource::File => format!("{} (from --file)", scope),
        ScopeSource::Settings => format!("{} (configured default)", scope),
        ScopeSource::Ambient => format!("{} (default)", scope),
    };
    debug!(scope = %scope, source = ?source, repo_root = %repo_root.display(), "target resolved");

    Ok(Target {
        scope,
        repo_root,
        display,
        source,
    })
}

fn non_blank(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|v| !v.is_empty())
}

/// Nearest ancestor of `cwd` (inclusive) containing a `.git` entry.
pub fn repo_root(cwd: &Path) -> Option<PathBuf> {
    cwd.ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}
