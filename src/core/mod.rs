//! Vault core.
//!
//! Everything below the command surface: document model, value codec,
//! identity, trust, the Sun store and the orchestrator that ties them
//! together.

pub mod audit;
pub mod cipher;
pub mod clock;
pub mod config;
pub mod constants;
pub mod dotenv;
pub mod identity;
pub mod kv;
pub mod scope;
pub mod sun;
pub mod trust;
pub mod validation;
pub mod vault;
