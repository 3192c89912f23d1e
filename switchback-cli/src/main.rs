//! Switchback CLI - Command-line interface
//!
//! Drives sender and receiver sessions over raw video files, compressed
//! streams, and decision traces.

mod commands;

use clap::Parser;
use switchback_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "switchback")]
#[command(about = "A quality-switching video delivery simulator")]
struct Cli {
    /// Console log level (full debug always goes to logs/)
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: CliLogLevel,

    #[command(subcommand)]
    command: commands::Commands,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), None)
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    if let Err(error) = commands::handle_command(cli.command) {
        tracing::error!(%error, "session failed");
        eprintln!("error: {}", error.user_message());
        std::process::exit(1);
    }

    Ok(())
}
