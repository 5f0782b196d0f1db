//! Error types for si.
//!
//! Each concern owns a focused enum; they fold into [`Error`] through
//! `#[from]`. The CLI layer never inspects the inner enums directly: it asks
//! the top-level error for its [`ErrorKind`], exit code, and hint.

use serde::Serialize;
use thiserror::Error;

/// Result type for si operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Dotenv(#[from] DotenvError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Sun(#[from] SunError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),
}

/// Input validation failures.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("key cannot be empty (expected [A-Z0-9_]+, not starting with a digit)")]
    EmptyKey,

    #[error("invalid key '{key}': {reason} (expected [A-Z0-9_]+, not starting with a digit)")]
    InvalidKey { key: String, reason: String },

    #[error("invalid scope '{scope}': {reason}")]
    InvalidScope { scope: String, reason: String },

    #[error("invalid value for '{0}': {1}")]
    InvalidValue(String, String),

    #[error("{0}")]
    Usage(String),
}

/// Dotenv parse failures.
#[derive(Debug, Error)]
pub enum DotenvError {
    #[error("line {line}: embedded NUL byte")]
    EmbeddedNul { line: usize },

    #[error("line {line}: unterminated double-quoted value")]
    UnterminatedQuote { line: usize },

    #[error("line {line}: invalid UTF-8")]
    InvalidUtf8 { line: usize },
}

/// Value codec failures.
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("malformed ciphertext: {0}")]
    BadCipher(String),

    #[error("value was not encrypted to this identity")]
    Unauthorized,

    #[error("ciphertext failed authentication: {0}")]
    Tampered(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("invalid age recipient: {0}")]
    InvalidRecipient(String),

    #[error("invalid age identity")]
    InvalidIdentity,
}

/// Sun object service failures.
#[derive(Debug, Error)]
pub enum SunError {
    #[error("sun unavailable: {0}")]
    Unavailable(String),

    #[error("sun rejected credentials: {0}")]
    Unauthorized(String),

    #[error("sun object not found: {kind}/{name}")]
    NotFound { kind: String, name: String },

    #[error("sun revision conflict on {kind}/{name}: {detail}")]
    Conflict {
        kind: String,
        name: String,
        detail: String,
    },

    #[error("payload of {size} bytes exceeds cap of {cap} bytes")]
    TooLarge { size: usize, cap: usize },

    #[error("sun is not configured: {0}")]
    NotConfigured(String),

    #[error("invalid sun response: {0}")]
    Protocol(String),
}

/// Vault orchestration failures.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("vault identity is missing")]
    IdentityMissing,

    #[error("vault identity already exists (use --force to replace it)")]
    IdentityExists,

    #[error("{key} not found in scope {scope}")]
    NotFound { scope: String, key: String },

    #[error("recipients for scope {scope} changed\n  expected: {expected}\n  actual:   {actual}")]
    TrustViolation {
        scope: String,
        expected: String,
        actual: String,
    },

    #[error("{0} is not supported in Sun remote vault mode")]
    Unsupported(String),

    #[error("plaintext values detected in scope {scope}: {}", keys.join(", "))]
    PlaintextFound { scope: String, keys: Vec<String> },

    #[error("{0}")]
    ConfirmationRequired(String),
}

/// Settings file failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot determine home directory")]
    NoHome,

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Classification of an error into the user-facing taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidKey,
    InvalidScope,
    Usage,
    IdentityMissing,
    BackendUnavailable,
    Unauthorized,
    NotFound,
    TrustViolation,
    Unsupported,
    Conflict,
    PlaintextFound,
    Crypto,
    Internal,
}

impl ErrorKind {
    /// Process exit code for this kind.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::InvalidKey
            | ErrorKind::InvalidScope
            | ErrorKind::Usage
            | ErrorKind::PlaintextFound => 2,
            ErrorKind::NotFound => 3,
            ErrorKind::TrustViolation => 4,
            ErrorKind::IdentityMissing
            | ErrorKind::BackendUnavailable
            | ErrorKind::Unauthorized => 5,
            ErrorKind::Unsupported => 6,
            ErrorKind::Conflict | ErrorKind::Crypto | ErrorKind::Internal => 1,
        }
    }
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(ValidationError::EmptyKey)
            | Error::Validation(ValidationError::InvalidKey { .. }) => ErrorKind::InvalidKey,
            Error::Validation(ValidationError::InvalidScope { .. }) => ErrorKind::InvalidScope,
            Error::Validation(_) | Error::Dotenv(_) | Error::Config(_) => ErrorKind::Usage,
            Error::Cipher(_) => ErrorKind::Crypto,
            Error::Sun(e) => match e {
                SunError::Unavailable(_) | SunError::Protocol(_) | SunError::NotConfigured(_) => {
                    ErrorKind::BackendUnavailable
                }
                SunError::Unauthorized(_) => ErrorKind::Unauthorized,
                SunError::NotFound { .. } => ErrorKind::NotFound,
                SunError::Conflict { .. } => ErrorKind::Conflict,
                SunError::TooLarge { .. } => ErrorKind::Usage,
            },
            Error::Vault(e) => match e {
                VaultError::IdentityMissing => ErrorKind::IdentityMissing,
                VaultError::IdentityExists | VaultError::ConfirmationRequired(_) => {
                    ErrorKind::Usage
                }
                VaultError::NotFound { .. } => ErrorKind::NotFound,
                VaultError::TrustViolation { .. } => ErrorKind::TrustViolation,
                VaultError::Unsupported(_) => ErrorKind::Unsupported,
                VaultError::PlaintextFound { .. } => ErrorKind::PlaintextFound,
            },
            Error::Io(_) | Error::Json(_) | Error::Prompt(_) => ErrorKind::Internal,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }

    /// One-line remediation, when there is an obvious one.
    pub fn hint(&self) -> Option<String> {
        match self {
            Error::Vault(VaultError::IdentityMissing) => Some("run: si vault init".to_string()),
            Error::Vault(VaultError::PlaintextFound { scope, .. }) => {
                Some(format!("Fix: si vault encrypt --scope {}", scope))
            }
            Error::Vault(VaultError::TrustViolation { .. }) => {
                Some("re-run with --accept-new-recipients to admit the new recipient set".into())
            }
            Error::Sun(SunError::Unauthorized(_)) => Some("run: si sun auth login".to_string()),
            Error::Sun(SunError::NotConfigured(_)) => Some(
                "set SI_SUN_BASE_URL and SI_SUN_TOKEN, or run: si sun auth login".to_string(),
            ),
            Error::Sun(SunError::Conflict { .. }) => {
                Some("another writer updated the object; retry the command".to_string())
            }
            _ => None,
        }
    }
}
