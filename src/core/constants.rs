//! Constants used throughout si.
//!
//! Centralizes magic strings and limits shared by the vault core.

/// Settings directory relative to HOME (~/.si).
pub const SETTINGS_DIR: &str = ".si";

/// Settings file name inside [`SETTINGS_DIR`].
pub const SETTINGS_FILE: &str = "settings.toml";

/// Local vault state directory relative to [`SETTINGS_DIR`].
pub const VAULT_DIR: &str = "vault";

/// Trust store file name inside the vault directory.
pub const TRUST_FILE: &str = "trust.json";

/// Audit log file name inside the vault directory.
pub const AUDIT_FILE: &str = "audit.log";

/// Prefix of every encrypted value.
pub const ENC_PREFIX: &str = "enc:v1:";

/// Sun kind holding the account identity.
pub const IDENTITY_KIND: &str = "vault_identity";

/// Object name of the account identity.
pub const IDENTITY_NAME: &str = "default";

/// Sun kind prefix for per-scope key/value objects.
pub const KV_KIND_PREFIX: &str = "vault_kv.";

/// Longest kind Sun accepts.
pub const MAX_KIND_LEN: usize = 128;

/// Hex characters of the SHA-256 suffix appended to overlong kinds.
pub const KIND_SUFFIX_LEN: usize = 16;

/// Longest normalized scope.
pub const MAX_SCOPE_LEN: usize = 119;

/// Longest key name.
pub const MAX_KEY_LEN: usize = 128;

/// Scope used when nothing else selects one.
pub const DEFAULT_SCOPE: &str = "default";

/// Content type of vault payloads.
pub const PAYLOAD_CONTENT_TYPE: &str = "text/plain";

/// Default payload cap (1 MiB).
pub const DEFAULT_PAYLOAD_CAP: usize = 1024 * 1024;

/// Page size used when listing a scope.
pub const KV_LIST_LIMIT: usize = 1000;

/// Schema version written into KV metadata and the trust store.
pub const SCHEMA_VERSION: u32 = 1;

/// Source tag for values written from the command line.
pub const SOURCE_CLI: &str = "cli";

/// Source tag for values written by a mirror/import.
pub const SOURCE_MIRROR: &str = "mirror";

/// Environment overrides honoured by the vault core.
pub const ENV_SUN_BASE_URL: &str = "SI_SUN_BASE_URL";
pub const ENV_SUN_TOKEN: &str = "SI_SUN_TOKEN";
pub const ENV_SUN_ACCOUNT: &str = "SI_SUN_ACCOUNT";
pub const ENV_SCOPE_DEFAULT: &str = "SI_VAULT_SCOPE_DEFAULT";
pub const ENV_AUDIT_LOG: &str = "SI_VAULT_AUDIT_LOG";
