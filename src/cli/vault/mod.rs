//! `si vault` commands.
//!
//! Each handler opens a [`Session`] (settings, resolved target, vault) and
//! renders the result either as text or, with `--json`, as JSON.

mod lifecycle;
mod recipients;
mod secrets;
mod transfer;

use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Args, Subcommand};
use dialoguer::Confirm;
use tracing::debug;

use crate::cli::output;
use crate::core::config::Settings;
use crate::core::constants::SOURCE_CLI;
use crate::core::scope::{self, ScopeInputs, ScopeSource, Target};
use crate::core::vault::{self as core_vault, Vault, VaultContext, VaultOptions};
use crate::error::Result;

/// Flags shared by every vault subcommand.
#[derive(Args, Debug, Default, Clone)]
pub struct CommonArgs {
    /// Vault scope, e.g. `demo` or `repo/env`
    #[arg(long, global = true)]
    pub scope: Option<String>,

    /// Deprecated: derive the scope from a dotenv file name
    #[arg(long, global = true, hide = true)]
    pub file: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Do not prompt for confirmation
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    /// Admit a changed recipient set for the scope
    #[arg(long, global = true)]
    pub accept_new_recipients: bool,
}

/// Vault subcommands.
#[derive(Subcommand, Debug)]
pub enum VaultCommand {
    /// Create the account identity if needed and trust the scope
    Init {
        /// Remember the scope as the configured default
        #[arg(long)]
        set_default: bool,
    },

    /// Encrypt and store a value
    Set {
        /// Key (e.g., DATABASE_URL)
        key: String,
        /// Value; read from stdin or prompted for when omitted
        value: Option<String>,
    },

    /// Show a value (masked unless --reveal)
    Get {
        key: String,
        /// Print the decrypted value
        #[arg(long)]
        reveal: bool,
    },

    /// Delete a key (writes a tombstone)
    Unset { key: String },

    /// List keys with masked values
    List {
        /// Print decrypted values
        #[arg(long)]
        reveal: bool,
    },

    /// Encrypt plaintext values in place on the remote
    Encrypt {
        /// Keys to encrypt (default: all)
        keys: Vec<String>,
    },

    /// Print decrypted KEY=value lines
    Decrypt {
        /// Keys to decrypt (default: all)
        keys: Vec<String>,
        /// Rewrite values in place (not supported remotely)
        #[arg(long)]
        in_place: bool,
    },

    /// Show revisions of a key
    History {
        key: String,
        /// Maximum revisions to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Show or change recipients
    Recipients {
        #[command(subcommand)]
        action: RecipientsAction,
    },

    /// Fail if any value is stored as plaintext
    Check,

    /// Print the scope as an encrypted dotenv document
    Dump,

    /// Import a dotenv file, encrypting plaintext values
    Import {
        /// Path to the dotenv file
        path: PathBuf,
        /// Tombstone remote keys missing from the file
        #[arg(long)]
        mirror: bool,
    },

    /// Run a command with decrypted values in its environment
    Run {
        /// Allow plaintext values (not recommended)
        #[arg(long)]
        allow_plaintext: bool,
        /// Command and arguments
        #[arg(trailing_var_arg = true, required = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Inspect or change the pinned recipient fingerprint
    Trust {
        #[command(subcommand)]
        action: TrustAction,
    },

    /// Replace the account identity and re-encrypt scopes
    Rotate {
        /// Scopes to re-encrypt (default: the selected scope)
        scopes: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum RecipientsAction {
    /// List recipients
    List,
    /// Add a recipient (not supported remotely)
    Add { recipient: String },
    /// Remove a recipient (not supported remotely)
    Remove { recipient: String },
}

#[derive(Subcommand, Debug)]
pub enum TrustAction {
    /// Compare the pinned fingerprint with the current one
    Status,
    /// Pin the current fingerprint
    Accept,
    /// Drop the pinned fingerprint
    Forget,
}

/// Everything a handler needs.
pub(crate) struct Session {
    pub home: PathBuf,
    pub target: Target,
    pub vault: Vault,
    pub json: bool,
}

impl Session {
    fn open(common: &CommonArgs) -> Result<Self> {
        let (settings, home) = Settings::load()?;
        let cwd = std::env::current_dir()?;
        let target = scope::resolve(
            ScopeInputs {
                scope: common.scope.as_deref(),
                file: common.file.as_deref(),
                configured: settings.vault.default_scope.as_deref(),
            },
            &cwd,
            &home,
        )?;
        if target.source == ScopeSource::File {
            output::warn("--file is deprecated; use --scope");
        }
        debug!(scope = %target.scope, "session opened");

        let ctx = VaultContext::from_settings(&settings, &home)?;
        let options = VaultOptions {
            accept_new_recipients: common.accept_new_recipients,
            assume_yes: common.yes,
            gate_writes: settings.vault.gate_writes.or(false),
            source: SOURCE_CLI.to_string(),
            confirm: interactive_confirm(),
        };
        Ok(Self {
            home,
            target,
            vault: Vault::new(ctx, options),
            json: common.json,
        })
    }

    /// The resolved target for another scope name.
    fn target_for(&self, raw: &str) -> Result<Target> {
        let scope = scope::Scope::parse(raw)?;
        Ok(Target::new(scope, self.target.repo_root.clone()))
    }
}

/// A yes/no prompt, only when both stdin and stderr are terminals.
fn interactive_confirm() -> Option<core_vault::Confirm> {
    if !(io::stdin().is_terminal() && io::stderr().is_terminal()) {
        return None;
    }
    Some(Box::new(|prompt: &str| {
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    }))
}

/// Run a vault subcommand. Returns the process exit code.
pub fn execute(common: &CommonArgs, command: VaultCommand) -> Result<i32> {
    let mut s = Session::open(common)?;
    match command {
        VaultCommand::Init { set_default } => lifecycle::init(&mut s, set_default)?,
        VaultCommand::Set { key, value } => secrets::set(&mut s, &key, value)?,
        VaultCommand::Get { key, reveal } => secrets::get(&mut s, &key, reveal)?,
        VaultCommand::Unset { key } => secrets::unset(&mut s, &key)?,
        VaultCommand::List { reveal } => secrets::list(&mut s, reveal)?,
        VaultCommand::Encrypt { keys } => lifecycle::encrypt(&mut s, &keys)?,
        VaultCommand::Decrypt { keys, in_place } => lifecycle::decrypt(&mut s, &keys, in_place)?,
        VaultCommand::History { key, limit } => secrets::history(&mut s, &key, limit)?,
        VaultCommand::Recipients { action } => recipients::execute(&mut s, action)?,
        VaultCommand::Check => lifecycle::check(&mut s)?,
        VaultCommand::Dump => transfer::dump(&mut s)?,
        VaultCommand::Import { path, mirror } => transfer::import(&mut s, &path, mirror)?,
        VaultCommand::Run {
            allow_plaintext,
            command,
        } => return transfer::run(&mut s, allow_plaintext, &command),
        VaultCommand::Trust { action } => recipients::trust(&mut s, action)?,
        VaultCommand::Rotate { scopes } => lifecycle::rotate(&mut s, &scopes)?,
    }
    Ok(0)
}
