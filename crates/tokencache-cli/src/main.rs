//! tokencache - inspect and manage cached eightctl OAuth tokens.
//!
//! Works against the same secure store eightctl uses, so it can show
//! whether a command will reuse a token or has to log in again.

mod commands;

use std::io;

use anyhow::Result;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tokencache_core::{StoreConfig, SystemOpener, TokenCache};

use commands::Command;

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, commands::USAGE);
            std::process::exit(2);
        }
    };

    let config = StoreConfig::load()?;
    debug!(backend = ?config.backend, service = %config.service, "loaded store config");
    let cache = TokenCache::new(SystemOpener::new(config));

    command.run(&cache, &mut io::stdout())
}
