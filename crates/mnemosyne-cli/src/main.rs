//! Mnemosyne CLI - Command-line interface for the Mnemosyne audit logging platform.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{Cli, Commands};

fn main() -> Result<()> {
    // Diagnostics go to stderr so command output stays machine-readable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mnemosyne=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::CheckConfig(args) => commands::check_config::run(&args),
        Commands::Log(args) => commands::log::run(&args),
        Commands::Ingest(args) => commands::ingest::run(&args),
        Commands::Query(args) => commands::query::run(&args),
        Commands::Show(args) => commands::show::run(&args),
        Commands::Version => {
            println!("mnemosyne {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
