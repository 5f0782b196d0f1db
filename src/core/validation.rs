//! Input validation for vault operations.
//!
//! Validates key names and values before they reach a document or the Sun
//! store.

use crate::core::constants::MAX_KEY_LEN;
use crate::error::{Result, ValidationError};

/// Validate a vault key name.
///
/// Keys are object names on the remote and environment variable names for
/// `si vault run`, so they are deliberately narrow:
/// - Only A-Z, 0-9, and underscore
/// - Cannot start with a digit
/// - Cannot be empty or longer than [`MAX_KEY_LEN`]
///
/// # Errors
///
/// Returns `ValidationError` if the key is invalid.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(ValidationError::EmptyKey.into());
    }

    if key.len() > MAX_KEY_LEN {
        return Err(ValidationError::InvalidKey {
            key: key.to_string(),
            reason: format!("longer than {} characters", MAX_KEY_LEN),
        }
        .into());
    }

    if let Some(first_char) = key.chars().next() {
        if first_char.is_ascii_digit() {
            return Err(ValidationError::InvalidKey {
                key: key.to_string(),
                reason: "cannot start with a digit".to_string(),
            }
            .into());
        }
    }

    for (i, ch) in key.chars().enumerate() {
        if !(ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_') {
            return Err(ValidationError::InvalidKey {
                key: key.to_string(),
                reason: format!("invalid character '{}' at position {}", ch, i + 1),
            }
            .into());
        }
    }

    Ok(())
}

/// Validate a value destined for a document or the remote.
///
/// Values may be empty but must not carry NUL bytes.
///
/// # Errors
///
/// Returns `ValidationError::InvalidValue` if the value contains NUL.
pub fn validate_value(key: &str, value: &str) -> Result<()> {
    if value.contains('\0') {
        return Err(
            ValidationError::InvalidValue(key.to_string(), "contains a NUL byte".into()).into(),
        );
    }

    Ok(())
}

/// Validate file permissions (Unix only).
///
/// Returns `Ok(false)` if the mode differs from `expected_mode`.
#[cfg(all(test, unix))]
pub(crate) fn has_mode(path: &std::path::Path, expected_mode: u32) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path)?;
    Ok(metadata.permissions().mode() & 0o777 == expected_mode)
}
