//! si - operator CLI with a remote-first, per-scope encrypted vault.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── output        # Terminal output helpers
//! │   └── vault/        # `si vault` subcommands
//! └── core/             # Vault core
//!     ├── dotenv/       # Lossless dotenv document + header block
//!     ├── cipher/       # enc:v1 value codec over age
//!     ├── sun/          # Sun object store: trait, HTTP client, in-memory store
//!     ├── identity      # Remote age identity lifecycle
//!     ├── trust         # Recipient fingerprint pinning
//!     ├── kv            # (scope, key) -> Sun object mapping
//!     ├── audit         # Append-only JSON lines audit log
//!     ├── scope         # Scope normalization and target resolution
//!     ├── config        # ~/.si/settings.toml and env overrides
//!     ├── clock         # Injectable time source
//!     └── vault/        # Orchestrator verbs
//! ```
//!
//! Sun is the single source of truth: every value lives as one object per
//! key under a kind derived from its scope, and the identity that decrypts
//! them lives there too. Locally there is only the trust store, the audit
//! log and the settings file.

pub mod cli;
pub mod core;
pub mod error;
