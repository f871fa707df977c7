//! CLI commands and argument parsing.

pub mod check_config;
pub mod ingest;
pub mod log;
pub mod query;
pub mod show;

use clap::{Parser, Subcommand, ValueEnum};

/// Mnemosyne - Audit Logging Platform
#[derive(Parser)]
#[command(name = "mnemosyne")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Validate a configuration file
    CheckConfig(check_config::CheckConfigArgs),

    /// Record a single audit event
    Log(log::LogArgs),

    /// Ingest events from a JSON-lines file into a database
    Ingest(ingest::IngestArgs),

    /// Query stored events
    Query(query::QueryArgs),

    /// Show one stored event
    Show(show::ShowArgs),

    /// Print version information
    Version,
}

/// Output format shared by commands that print structured results.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
