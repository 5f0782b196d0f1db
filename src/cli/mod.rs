//! Command-line interface.

pub mod output;
pub mod vault;

use clap::{CommandFactory, Parser, Subcommand};

use crate::error::Result;

/// si - remote-first secrets vault.
#[derive(Parser)]
#[command(
    name = "si",
    about = "Remote-first, per-scope encrypted secrets vault",
    version
)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Whether the invocation asked for JSON output.
    pub fn json(&self) -> bool {
        match &self.command {
            Command::Vault { common, .. } => common.json,
            Command::Completions { .. } => false,
        }
    }
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Manage the encrypted vault
    Vault {
        #[command(flatten)]
        common: vault::CommonArgs,
        #[command(subcommand)]
        command: vault::VaultCommand,
    },

    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Execute a command. Returns the process exit code.
pub fn execute(command: Command) -> Result<i32> {
    match command {
        Command::Vault { common, command } => vault::execute(&common, command),
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "si", &mut std::io::stdout());
            Ok(0)
        }
    }
}
