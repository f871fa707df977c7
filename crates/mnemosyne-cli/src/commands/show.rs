//! Show command implementation.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use mnemosyne_storage::SqlBackend;

/// Arguments for the show command.
#[derive(Args)]
pub struct ShowArgs {
    /// Database URL (sqlite:///path/to/audit.db)
    #[arg(long, env = "MNEMOSYNE_DB")]
    pub db: String,

    /// Event identifier
    pub event_id: String,
}

/// Runs the show command.
pub fn run(args: &ShowArgs) -> Result<()> {
    info!(event_id = %args.event_id, "Fetching event");

    let store = SqlBackend::new(&args.db).context("Failed to open database")?;
    let Some(event) = store.get_event(&args.event_id)? else {
        anyhow::bail!("Event not found: {}", args.event_id);
    };

    println!("{}", serde_json::to_string_pretty(&event)?);
    Ok(())
}
