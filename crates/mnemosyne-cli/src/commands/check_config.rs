//! Check-config command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use mnemosyne_audit::{AuditConfig, BackendConfig, FilterChain, FilterConfig};

use super::OutputFormat;

/// Arguments for the check-config command.
#[derive(Args)]
pub struct CheckConfigArgs {
    /// Path to the YAML configuration file
    pub file: PathBuf,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Runs the check-config command.
pub fn run(args: &CheckConfigArgs) -> Result<()> {
    info!(path = %args.file.display(), "Checking configuration");

    let config = load(&args.file)?;

    match args.format {
        OutputFormat::Text => print_text(&config),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
    }
    Ok(())
}

/// Loads and fully validates a configuration, including filter names.
fn load(path: &Path) -> Result<AuditConfig> {
    let config = AuditConfig::from_file(path)
        .with_context(|| format!("Invalid configuration: {}", path.display()))?;
    FilterChain::from_config(&config.filters)
        .with_context(|| format!("Invalid filters in {}", path.display()))?;
    Ok(config)
}

fn print_text(config: &AuditConfig) {
    println!("Mnemosyne Configuration");
    println!("=======================");
    println!();
    println!("Application: {}", config.application_name);
    println!("Environment: {}", config.environment);
    println!("Enabled: {}", config.enabled);
    println!(
        "Sanitization: {} (fail {})",
        if config.sanitization.enabled { "on" } else { "off" },
        if config.fail_on_sanitization_error { "closed" } else { "open" }
    );

    println!();
    println!("Backends:");
    if config.storage.backends.is_empty() {
        println!("  (none; the default file backend will be used)");
    }
    for backend in &config.storage.backends {
        let icon = if backend.is_enabled() { "✓" } else { "-" };
        match backend {
            BackendConfig::File(file) => println!(
                "  {icon} file {} [{}] {}",
                file.directory, file.format, file.filename_pattern
            ),
            BackendConfig::Sql(sql) => println!("  {icon} sql {}", sql.url),
        }
    }

    if !config.filters.is_empty() {
        println!();
        println!("Filters:");
        for filter in &config.filters {
            match filter {
                FilterConfig::ExcludeCategory { categories } => {
                    println!("  exclude categories: {}", categories.join(", "));
                }
                FilterConfig::ExcludeActionType { action_types } => {
                    println!("  exclude action types: {}", action_types.join(", "));
                }
            }
        }
    }

    println!("\n✓ Configuration is valid");
}
