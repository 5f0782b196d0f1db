//! Value codec.
//!
//! Stored values are either plaintext or `enc:v1:` followed by the base64
//! of a binary age file. Only this module knows the framing; everything
//! above it calls [`encrypt`], [`decrypt`] and [`is_encrypted`].
//!
//! ## Backends
//!
//! The [`Cipher`] trait is the seam for the encryption primitive. [`Age`]
//! (x25519) is the only implementation.

use ::age::x25519;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use zeroize::Zeroizing;

use crate::core::constants::ENC_PREFIX;
use crate::error::{CipherError, Result};

mod age;

pub use self::age::{parse_identity, parse_recipient, Age};

/// Encryption primitive.
pub trait Cipher {
    /// Public encryption target.
    type Recipient;

    /// Private decryption key.
    type Identity;

    /// Encrypt `plaintext` to every recipient, producing an opaque blob.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::EncryptionFailed` if encryption fails.
    fn encrypt(&self, plaintext: &[u8], recipients: &[Self::Recipient]) -> Result<Vec<u8>>;

    /// Decrypt a blob produced by [`Cipher::encrypt`].
    ///
    /// # Errors
    ///
    /// `BadCipher` if the blob is malformed, `Unauthorized` if it was not
    /// encrypted to `identity`, `Tampered` if authentication fails.
    fn decrypt(&self, blob: &[u8], identity: &Self::Identity) -> Result<Zeroizing<Vec<u8>>>;

    /// Backend name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Whether `value` is an `enc:v1:` ciphertext.
pub fn is_encrypted(value: &str) -> bool {
    value
        .strip_prefix(ENC_PREFIX)
        .and_then(decode_body)
        .is_some_and(|b| !b.is_empty())
}

/// Encrypt `plaintext` and frame it as `enc:v1:<base64>`.
pub fn encrypt(plaintext: &str, recipients: &[x25519::Recipient]) -> Result<String> {
    let blob = Age.encrypt(plaintext.as_bytes(), recipients)?;
    Ok(format!("{}{}", ENC_PREFIX, URL_SAFE_NO_PAD.encode(blob)))
}

/// Unwrap and decrypt an `enc:v1:` value.
pub fn decrypt(value: &str, identity: &x25519::Identity) -> Result<Zeroizing<String>> {
    let body = value
        .trim()
        .strip_prefix(ENC_PREFIX)
        .ok_or_else(|| CipherError::BadCipher("missing enc:v1: prefix".into()))?;
    let blob = decode_body(body)
        .ok_or_else(|| CipherError::BadCipher("body is not base64".into()))?;

    let plain = Age.decrypt(&blob, identity)?;
    let text = String::from_utf8(plain.to_vec())
        .map_err(|_| CipherError::BadCipher("plaintext is not UTF-8".into()))?;
    Ok(Zeroizing::new(text))
}

/// Strip one surrounding layer of dotenv quoting and outer whitespace.
///
/// Used to compare stored values; never turns plaintext into ciphertext.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}

fn decode_body(body: &str) -> Option<Vec<u8>> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    [URL_SAFE_NO_PAD, URL_SAFE, STANDARD_NO_PAD, STANDARD]
        .iter()
        .find_map(|engine| engine.decode(body).ok())
}
