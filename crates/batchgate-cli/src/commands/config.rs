//! Config command - Inspect the effective configuration
//!
//! `batchgate config show` prints the configuration after environment
//! overrides; `batchgate config validate` reports every problem found.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use serde_json::json;
use tracing::info;

use crate::{
    output::{get_formatter, OutputFormat},
    LoadedConfig,
};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration and report errors
    Validate,
}

impl ConfigCommand {
    pub fn execute(&self, loaded: &LoadedConfig, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => show(loaded, format),
            ConfigCommand::Validate => validate(loaded, format),
        }
    }
}

fn show(loaded: &LoadedConfig, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    info!(config_path = %loaded.path.display(), "Showing configuration");

    match format {
        OutputFormat::Json => {
            let value = serde_json::to_value(&loaded.config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&value);
        }
        OutputFormat::Human => {
            formatter.success(&format!("Configuration ({})", loaded.path.display()));
            formatter.info("");
            let yaml = serde_yaml::to_string(&loaded.config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }
    }

    Ok(())
}

fn validate(loaded: &LoadedConfig, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let errors = loaded.config.validate();

    if format == OutputFormat::Json {
        formatter.print_json(&json!({
            "valid": errors.is_empty(),
            "config_path": loaded.path.display().to_string(),
            "errors": errors
                .iter()
                .map(|e| json!({"field": e.field, "message": e.message}))
                .collect::<Vec<_>>(),
        }));
    } else if errors.is_empty() {
        formatter.success(&format!(
            "Configuration is valid ({})",
            loaded.path.display()
        ));
    } else {
        for e in &errors {
            formatter.error(&e.to_string());
        }
    }

    if !errors.is_empty() {
        bail!("Configuration has {} error(s)", errors.len());
    }
    Ok(())
}
