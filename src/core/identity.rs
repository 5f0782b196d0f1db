//! Account identity.
//!
//! One age X25519 identity per account, stored remotely as the Sun object
//! `(vault_identity, default)` whose payload is the `AGE-SECRET-KEY-1…`
//! line. It is read once per command and never cached on disk.

use std::sync::Arc;

use age::secrecy::ExposeSecret;
use age::x25519;
use serde_json::json;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::core::cipher::parse_identity;
use crate::core::constants::{IDENTITY_KIND, IDENTITY_NAME, PAYLOAD_CONTENT_TYPE, SCHEMA_VERSION};
use crate::core::sun::{Metadata, PutRequest, SunStore};
use crate::error::{Error, Result, SunError, VaultError};

/// A loaded identity and the revision it was read at.
pub struct Identity {
    inner: x25519::Identity,
    revision: u64,
}

impl Identity {
    /// Public recipient string (`age1…`).
    pub fn recipient(&self) -> String {
        self.inner.to_public().to_string()
    }

    pub fn recipient_key(&self) -> x25519::Recipient {
        self.inner.to_public()
    }

    pub fn as_age(&self) -> &x25519::Identity {
        &self.inner
    }

    /// Revision of the identity object this was read from; 0 for an
    /// identity that has not been stored yet.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// A fresh identity, not yet stored anywhere.
    pub fn generate() -> Self {
        Self {
            inner: x25519::Identity::generate(),
            revision: 0,
        }
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("recipient", &self.recipient())
            .field("revision", &self.revision)
            .finish()
    }
}

/// Loads and writes the account identity.
pub struct IdentityService {
    sun: Arc<dyn SunStore>,
}

impl IdentityService {
    pub fn new(sun: Arc<dyn SunStore>) -> Self {
        Self { sun }
    }

    /// Fetch the identity.
    ///
    /// # Errors
    ///
    /// `IdentityMissing` if the object was never written, transport errors
    /// as-is.
    pub fn load(&self) -> Result<Identity> {
        let object = match self.sun.get_payload(IDENTITY_KIND, IDENTITY_NAME) {
            Ok(object) => object,
            Err(Error::Sun(SunError::NotFound { .. })) => {
                return Err(VaultError::IdentityMissing.into())
            }
            Err(e) => return Err(e),
        };
        let secret = Zeroizing::new(String::from_utf8_lossy(&object.payload).into_owned());
        if secret.trim().is_empty() {
            return Err(VaultError::IdentityMissing.into());
        }
        let inner = parse_identity(&secret)?;
        debug!(revision = object.revision, "identity loaded");
        Ok(Identity {
            inner,
            revision: object.revision,
        })
    }

    /// Create a fresh identity.
    ///
    /// # Errors
    ///
    /// `IdentityExists` when one is already stored and `force` is off.
    pub fn init(&self, force: bool) -> Result<Identity> {
        let current = self.current_revision()?;
        if current > 0 && !force {
            return Err(VaultError::IdentityExists.into());
        }
        let identity = self.write(Identity::generate(), current, "init")?;
        info!(revision = identity.revision, "identity created");
        Ok(identity)
    }

    /// Store `next` in place of `current`. Fails with `Conflict` if
    /// someone else wrote the identity since `current` was loaded.
    pub fn rotate(&self, current: &Identity, next: Identity) -> Result<Identity> {
        let identity = self.write(next, current.revision, "rotate")?;
        info!(
            from = current.revision,
            to = identity.revision,
            "identity rotated"
        );
        Ok(identity)
    }

    /// Recipient of the stored identity.
    pub fn recipient(&self) -> Result<String> {
        Ok(self.load()?.recipient())
    }

    fn current_revision(&self) -> Result<u64> {
        match self.sun.get_payload(IDENTITY_KIND, IDENTITY_NAME) {
            Ok(object) => Ok(object.revision),
            Err(Error::Sun(SunError::NotFound { .. })) => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn write(&self, identity: Identity, expected: u64, operation: &str) -> Result<Identity> {
        let inner = identity.inner;
        let secret = inner.to_string();
        let payload = Zeroizing::new(format!("{}\n", secret.expose_secret()).into_bytes());

        let mut metadata = Metadata::new();
        metadata.insert("version".into(), json!(SCHEMA_VERSION));
        metadata.insert("operation".into(), json!(operation));
        metadata.insert("recipient".into(), json!(inner.to_public().to_string()));

        let revision = self.sun.put(PutRequest {
            kind: IDENTITY_KIND,
            name: IDENTITY_NAME,
            payload: &payload,
            content_type: PAYLOAD_CONTENT_TYPE,
            metadata,
            if_match_rev: Some(expected),
        })?;
        Ok(Identity { inner, revision })
    }
}
