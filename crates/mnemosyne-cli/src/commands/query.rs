//! Query command implementation.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use mnemosyne_core::{validate_action_type, validate_category};
use mnemosyne_storage::{Column, EventQuery, SqlBackend};

use super::OutputFormat;

/// Arguments for the query command.
#[derive(Args)]
pub struct QueryArgs {
    /// Database URL (sqlite:///path/to/audit.db)
    #[arg(long, env = "MNEMOSYNE_DB")]
    pub db: String,

    /// Only events in this category
    #[arg(long)]
    pub category: Option<String>,

    /// Only events with this action type
    #[arg(long)]
    pub action_type: Option<String>,

    /// Only events by this user
    #[arg(long)]
    pub username: Option<String>,

    /// Only events from this application
    #[arg(long)]
    pub application: Option<String>,

    /// Only events from this environment
    #[arg(long)]
    pub environment: Option<String>,

    /// Only events with this result status
    #[arg(long)]
    pub status: Option<String>,

    /// Maximum number of events
    #[arg(long, default_value = "50")]
    pub limit: usize,

    /// Number of events to skip
    #[arg(long, default_value = "0")]
    pub offset: usize,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// One page of results.
#[derive(Debug, Serialize)]
struct QueryPage {
    total: u64,
    limit: usize,
    offset: usize,
    events: Vec<Value>,
}

/// Runs the query command.
pub fn run(args: &QueryArgs) -> Result<()> {
    let query = build_query(args)?;
    info!(db = %args.db, "Querying events");

    let store = SqlBackend::new(&args.db).context("Failed to open database")?;
    let page = QueryPage {
        total: store.count(&query)?,
        limit: args.limit,
        offset: args.offset,
        events: store.query(&query)?,
    };

    match args.format {
        OutputFormat::Text => print_text(&page),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&page)?),
    }
    Ok(())
}

fn build_query(args: &QueryArgs) -> Result<EventQuery> {
    let mut query = EventQuery::new()
        .with_limit(args.limit)
        .with_offset(args.offset);

    if let Some(category) = &args.category {
        query = query.with_filter(Column::ActionCategory, validate_category(category)?);
    }
    if let Some(action_type) = &args.action_type {
        query = query.with_filter(Column::ActionType, validate_action_type(action_type)?);
    }
    if let Some(status) = &args.status {
        query = query.with_filter(Column::ResultStatus, status.to_uppercase());
    }

    let exact = [
        (Column::ActorUsername, &args.username),
        (Column::Application, &args.application),
        (Column::Environment, &args.environment),
    ];
    for (column, value) in exact {
        if let Some(value) = value {
            query = query.with_filter(column, value.as_str());
        }
    }
    Ok(query)
}

fn print_text(page: &QueryPage) {
    println!(
        "Showing {} of {} events (offset {})",
        page.events.len(),
        page.total,
        page.offset
    );
    println!();

    for event in &page.events {
        let field = |path: &[&str]| {
            path.iter()
                .try_fold(event, |value, key| value.get(key))
                .and_then(Value::as_str)
                .unwrap_or("-")
                .to_string()
        };

        println!(
            "{}  {}  {:<10} {:<8} {:<24} {:<16} {}",
            field(&["timestamp"]),
            field(&["event_id"]),
            field(&["action", "category"]),
            field(&["action", "type"]),
            field(&["action", "operation"]),
            field(&["actor", "username"]),
            field(&["action", "result", "status"]),
        );
    }
}
