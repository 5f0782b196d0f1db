//! Age encryption backend.
//!
//! Encrypts to x25519 recipients in the binary age format. Decryption
//! also accepts ASCII-armored input.

use std::io::{Read, Write};
use std::str::FromStr;

use ::age::x25519;
use age::DecryptError;
use tracing::trace;
use zeroize::Zeroizing;

use super::Cipher;
use crate::error::{CipherError, Result};

/// Age-based cryptographic backend using x25519 keys.
pub struct Age;

impl Cipher for Age {
    type Recipient = x25519::Recipient;
    type Identity = x25519::Identity;

    fn name(&self) -> &'static str {
        "age"
    }

    fn encrypt(&self, plaintext: &[u8], recipients: &[x25519::Recipient]) -> Result<Vec<u8>> {
        trace!(
            recipients = recipients.len(),
            plaintext_len = plaintext.len(),
            "encrypting"
        );

        let encryptor =
            age::Encryptor::with_recipients(recipients.iter().map(|r| r as &dyn age::Recipient))
                .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;

        let mut blob = Vec::new();
        let mut writer = encryptor
            .wrap_output(&mut blob)
            .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;
        writer
            .write_all(plaintext)
            .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;

        trace!(ciphertext_len = blob.len(), "encrypted");
        Ok(blob)
    }

    fn decrypt(&self, blob: &[u8], identity: &x25519::Identity) -> Result<Zeroizing<Vec<u8>>> {
        trace!(ciphertext_len = blob.len(), "decrypting");

        let reader = age::armor::ArmoredReader::new(blob);
        let decryptor =
            age::Decryptor::new(reader).map_err(|e| CipherError::BadCipher(e.to_string()))?;

        let mut stream = decryptor
            .decrypt(std::iter::once(identity as &dyn age::Identity))
            .map_err(classify)?;

        let mut plain = Zeroizing::new(Vec::new());
        stream
            .read_to_end(&mut plain)
            .map_err(|e| CipherError::Tampered(e.to_string()))?;

        trace!(plaintext_len = plain.len(), "decrypted");
        Ok(plain)
    }
}

fn classify(err: DecryptError) -> CipherError {
    match err {
        DecryptError::NoMatchingKeys => CipherError::Unauthorized,
        DecryptError::InvalidMac | DecryptError::DecryptionFailed => {
            CipherError::Tampered(err.to_string())
        }
        _ => CipherError::BadCipher(err.to_string()),
    }
}

/// Parse a public key string into an age recipient.
///
/// # Errors
///
/// Returns `CipherError::InvalidRecipient` if the key format is invalid.
pub fn parse_recipient(key: &str) -> Result<x25519::Recipient> {
    x25519::Recipient::from_str(key.trim())
        .map_err(|_| CipherError::InvalidRecipient(key.trim().to_string()).into())
}

/// Parse an `AGE-SECRET-KEY-1...` string.
///
/// # Errors
///
/// Returns `CipherError::InvalidIdentity`; the input is never echoed.
pub fn parse_identity(secret: &str) -> Result<x25519::Identity> {
    x25519::Identity::from_str(secret.trim()).map_err(|_| CipherError::InvalidIdentity.into())
}
