//! Log command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{json, Value};
use tracing::info;

use mnemosyne_audit::{AuditConfig, AuditEngine, LogRequest};

use super::OutputFormat;

/// Arguments for the log command.
#[derive(Args)]
pub struct LogArgs {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "MNEMOSYNE_CONFIG")]
    pub config: PathBuf,

    /// Operation name
    #[arg(short, long)]
    pub action: String,

    /// Action category
    #[arg(long, default_value = "SYSTEM")]
    pub category: String,

    /// Action type
    #[arg(long, default_value = "EXECUTE")]
    pub action_type: String,

    /// Acting user
    #[arg(long)]
    pub username: Option<String>,

    /// Free-text description
    #[arg(long)]
    pub description: Option<String>,

    /// Action parameter as key=value; the value is parsed as JSON if it can be
    #[arg(short, long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Runs the log command.
pub fn run(args: &LogArgs) -> Result<()> {
    let config = AuditConfig::from_file(&args.config)
        .with_context(|| format!("Invalid configuration: {}", args.config.display()))?;
    let engine = AuditEngine::new(config)?;

    let request = build_request(args)?;
    info!(action = %args.action, "Logging audit event");

    let outcome = engine.log(request);
    engine.shutdown();

    match outcome? {
        Some(event) => match args.format {
            OutputFormat::Text => println!("✓ Logged event {}", event.event_id()),
            OutputFormat::Json => println!("{}", event.to_json_pretty()?),
        },
        None => println!("Event was not stored (logging disabled or filtered out)"),
    }
    Ok(())
}

fn build_request(args: &LogArgs) -> Result<LogRequest> {
    let mut request = LogRequest::new(&args.action)
        .with_category(&args.category)
        .with_action_type(&args.action_type);

    if let Some(username) = &args.username {
        request = request.with_actor(json!({"type": "user", "username": username}));
    }
    if let Some(description) = &args.description {
        request = request.with_description(description);
    }
    for param in &args.params {
        let (key, value) = parse_param(param)?;
        request = request.with_parameter(key, value);
    }
    Ok(request)
}

fn parse_param(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("Parameter must be KEY=VALUE: {raw}"))?;
    if key.is_empty() {
        anyhow::bail!("Parameter key cannot be empty: {raw}");
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
