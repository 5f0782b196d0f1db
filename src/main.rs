//! si - operator CLI with a remote-first, per-scope encrypted vault.

use clap::Parser;
use serde_json::json;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use si::cli::output;
use si::cli::{execute, Cli};

fn main() {
    let cli = Cli::parse();
    let json = cli.json();

    let filter = EnvFilter::try_from_env("SI_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("si=debug")
        } else {
            EnvFilter::new("si=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .init();

    match execute(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let code = e.exit_code();
            let hint = e.hint();

            output::error(&e.to_string());
            if let Some(hint) = &hint {
                output::hint(hint);
            }
            if json {
                let _ = output::json(&json!({
                    "error": {
                        "kind": e.kind(),
                        "message": e.to_string(),
                        "exit_code": code,
                        "hint": hint,
                    }
                }));
            }
            std::process::exit(code);
        }
    }
}
