//! Finguard - Resilient market data and option pricing
//!
//! CLI entry point.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::debug;

mod cli;
mod config;
mod logging;
mod shutdown;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();
    let config = config::load_config()?;
    logging::init(&config.logging);

    debug!("Starting Finguard v{}", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    shutdown::cancel_on_signal(cancel.clone());

    let result = cli::run(cli, config, cancel.clone()).await;
    cancel.cancel();
    result
}
