//! Settings file management.
//!
//! Reads `~/.si/settings.toml` and layers the enumerated `SI_*` environment
//! overrides on top. The vault core treats settings as read-only; the only
//! writer is [`Settings::save_default_scope`], called by the CLI for
//! `si vault init --set-default`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::constants;
use crate::core::trust::{create_private_dir, write_private};
use crate::error::{ConfigError, Result};

/// A three-valued option: unset means "do not override the default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Toggle {
    #[default]
    Unset,
    On,
    Off,
}

impl Toggle {
    /// Resolve against a default.
    pub fn or(self, default: bool) -> bool {
        match self {
            Toggle::Unset => default,
            Toggle::On => true,
            Toggle::Off => false,
        }
    }
}

impl From<Option<bool>> for Toggle {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Toggle::Unset,
            Some(true) => Toggle::On,
            Some(false) => Toggle::Off,
        }
    }
}

impl From<Toggle> for Option<bool> {
    fn from(value: Toggle) -> Self {
        match value {
            Toggle::Unset => None,
            Toggle::On => Some(true),
            Toggle::Off => Some(false),
        }
    }
}

/// Contents of `~/.si/settings.toml` relevant to the vault.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub sun: SunSettings,
    #[serde(default)]
    pub vault: VaultSettings,
}

/// `[sun]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SunSettings {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub account: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub list_timeout_seconds: Option<u64>,
    pub payload_cap_bytes: Option<usize>,
    #[serde(default)]
    pub allow_insecure_http: Toggle,
}

/// `[vault]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultSettings {
    pub default_scope: Option<String>,
    pub audit_log: Option<PathBuf>,
    pub trust_store: Option<PathBuf>,
    /// Send `if_match_rev` on KV writes.
    #[serde(default)]
    pub gate_writes: Toggle,
    #[serde(default)]
    pub audit: Toggle,
}

impl SunSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(15))
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_seconds.unwrap_or(20))
    }

    pub fn payload_cap(&self) -> usize {
        self.payload_cap_bytes
            .unwrap_or(constants::DEFAULT_PAYLOAD_CAP)
    }
}

impl Settings {
    /// Path of the settings file under `home`.
    pub fn path(home: &Path) -> PathBuf {
        home.join(constants::SETTINGS_DIR)
            .join(constants::SETTINGS_FILE)
    }

    /// Load settings from the user's home and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NoHome` without a home directory, or
    /// `ConfigError::Parse` if the file is malformed.
    pub fn load() -> Result<(Self, PathBuf)> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHome)?;
        let mut settings = Self::load_from(&home)?;
        settings.apply_env(|name| std::env::var(name).ok());
        Ok((settings, home))
    }

    /// Load the settings file under `home`; a missing file yields defaults.
    pub fn load_from(home: &Path) -> Result<Self> {
        let path = Self::path(home);
        if !path.exists() {
            debug!(path = %path.display(), "no settings file");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)?;
        let settings: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Apply the `SI_*` overrides. Blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        if let Some(v) = get(constants::ENV_SUN_BASE_URL) {
            self.sun.base_url = Some(v);
        }
        if let Some(v) = get(constants::ENV_SUN_TOKEN) {
            self.sun.token = Some(v);
        }
        if let Some(v) = get(constants::ENV_SUN_ACCOUNT) {
            self.sun.account = Some(v);
        }
        if let Some(v) = get(constants::ENV_SCOPE_DEFAULT) {
            self.vault.default_scope = Some(v);
        }
        if let Some(v) = get(constants::ENV_AUDIT_LOG) {
            self.vault.audit_log = Some(PathBuf::from(v));
        }
    }

    /// Local vault state directory (`~/.si/vault`).
    pub fn vault_dir(home: &Path) -> PathBuf {
        home.join(constants::SETTINGS_DIR).join(constants::VAULT_DIR)
    }

    pub fn trust_path(&self, home: &Path) -> PathBuf {
        self.vault
            .trust_store
            .clone()
            .unwrap_or_else(|| Self::vault_dir(home).join(constants::TRUST_FILE))
    }

    pub fn audit_path(&self, home: &Path) -> PathBuf {
        self.vault
            .audit_log
            .clone()
            .unwrap_or_else(|| Self::vault_dir(home).join(constants::AUDIT_FILE))
    }

    /// Persist `vault.default_scope`, leaving every other key in the file as
    /// it was.
    pub fn save_default_scope(home: &Path, scope: &str) -> Result<()> {
        let path = Self::path(home);
        let mut table: toml::Table = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?
        } else {
            toml::Table::new()
        };

        let vault = table
            .entry("vault")
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if let toml::Value::Table(vault) = vault {
            vault.insert(
                "default_scope".to_string(),
                toml::Value::String(scope.to_string()),
            );
        }

        if let Some(parent) = path.parent() {
            create_private_dir(parent)?;
        }
        let contents = toml::to_string_pretty(&table).map_err(ConfigError::Serialize)?;
        write_private(&path, contents.as_bytes())?;
        debug!(path = %path.display(), scope, "default scope saved");
        Ok(())
    }
}
