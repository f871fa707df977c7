//! Ingest command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use mnemosyne_audit::{EventIngestor, MAX_BATCH_SIZE};
use mnemosyne_storage::SqlBackend;

use super::OutputFormat;

/// Arguments for the ingest command.
#[derive(Args)]
pub struct IngestArgs {
    /// Database URL (sqlite:///path/to/audit.db)
    #[arg(long, env = "MNEMOSYNE_DB")]
    pub db: String,

    /// JSON-lines file with one event per line
    pub file: PathBuf,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// A line that could not be ingested.
#[derive(Debug, Serialize)]
struct LineError {
    line: usize,
    error: String,
}

/// Result of ingesting a file.
#[derive(Debug, Default, Serialize)]
struct IngestSummary {
    accepted: usize,
    errors: Vec<LineError>,
}

/// Runs the ingest command.
pub fn run(args: &IngestArgs) -> Result<()> {
    info!(file = %args.file.display(), db = %args.db, "Ingesting events");

    let store = SqlBackend::new(&args.db).context("Failed to open database")?;
    let ingestor = EventIngestor::new(store);
    let summary = ingest_file(&ingestor, &args.file)?;

    match args.format {
        OutputFormat::Text => {
            println!("Accepted: {}", summary.accepted);
            if !summary.errors.is_empty() {
                println!("\nErrors:");
                for error in &summary.errors {
                    println!("✗ line {}: {}", error.line, error.error);
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }

    if summary.accepted == 0 && !summary.errors.is_empty() {
        anyhow::bail!("No events were ingested");
    }
    Ok(())
}

fn ingest_file(ingestor: &EventIngestor, path: &Path) -> Result<IngestSummary> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut summary = IngestSummary::default();
    let mut pending: Vec<(usize, Value)> = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(value) => pending.push((line_no, value)),
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping malformed line");
                summary.errors.push(LineError {
                    line: line_no,
                    error: format!("invalid JSON: {e}"),
                });
            }
        }
    }

    for chunk in pending.chunks(MAX_BATCH_SIZE) {
        let lines: Vec<usize> = chunk.iter().map(|(line, _)| *line).collect();
        let outcome = ingestor.ingest_batch(chunk.iter().map(|(_, v)| v.clone()).collect())?;

        summary.accepted += outcome.accepted.len();
        summary
            .errors
            .extend(outcome.errors.into_iter().map(|failure| LineError {
                line: lines[failure.index],
                error: failure.error,
            }));
    }

    summary.errors.sort_by_key(|e| e.line);
    Ok(summary)
}
