//! Config command - View and check Stocktake configuration
//!
//! Provides the `stocktake config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON) with PINs masked
//! 2. Validates the configuration and reports every problem found

use anyhow::{Context, Result};
use clap::Subcommand;
use stocktake_core::config::Config;
use stocktake_core::domain::StaffName;
use tracing::info;

use crate::context::AppContext;
use crate::output::{get_formatter, OutputFormat};

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx, format),
            ConfigCommand::Validate => self.execute_validate(ctx, format),
        }
    }

    fn execute_show(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let masked = masked(&ctx.config)?;

        info!(config_path = %ctx.config_path.display(), "Showing configuration");

        if format.is_json() {
            let json = serde_json::json!({
                "config_path": ctx.config_path.display().to_string(),
                "found": ctx.config_found,
                "config": masked,
            });
            formatter.print_json(&json);
            return Ok(());
        }

        if ctx.config_found {
            formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
        } else {
            formatter.success("Configuration (built-in defaults)");
            formatter.info(&format!("No file at {}", ctx.config_path.display()));
        }
        formatter.info("");

        let yaml =
            serde_yaml::to_string(&masked).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }

        // Names that fail to parse are reported by `config validate`
        if let Ok(summary) = staff_summary(&ctx.config) {
            formatter.info("");
            for line in &summary {
                formatter.info(line);
            }
        }

        Ok(())
    }

    fn execute_validate(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        info!(config_path = %ctx.config_path.display(), "Validating configuration");

        let mut errors: Vec<String> = ctx.config.validate().iter().map(|e| e.to_string()).collect();
        if !ctx.config_found {
            errors.insert(
                0,
                format!("Configuration file not found at {}", ctx.config_path.display()),
            );
        }

        if format.is_json() {
            let json = serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": ctx.config_path.display().to_string(),
                "errors": errors,
            });
            formatter.print_json(&json);
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", ctx.config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", ctx.config_path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {error}"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("configuration is invalid")
        }
    }
}

/// Configuration as JSON with `staff.pins` replaced by masked entries
///
/// Masked PINs of equal length would collide as map keys, so the pins map
/// becomes a list of `{pin, name}` objects.
fn masked(config: &Config) -> Result<serde_json::Value> {
    let mut value =
        serde_json::to_value(config).context("Failed to serialize configuration to JSON")?;
    let pins: Vec<serde_json::Value> = config
        .staff
        .pins
        .iter()
        .map(|(pin, name)| {
            serde_json::json!({
                "pin": "*".repeat(pin.chars().count()),
                "name": name,
            })
        })
        .collect();
    if let Some(staff) = value.get_mut("staff").and_then(|s| s.as_object_mut()) {
        staff.insert("pins".to_string(), serde_json::Value::Array(pins));
    }
    Ok(value)
}

/// Who can sign in and who can verify under this configuration
fn staff_summary(config: &Config) -> Result<Vec<String>> {
    let directory = config
        .staff_directory()
        .context("Invalid staff.pins in configuration")?;
    let roster = config
        .supervisor_roster()
        .context("Invalid staff.supervisors in configuration")?;

    let mut lines = Vec::with_capacity(2);
    if directory.is_empty() {
        lines.push("No staff PINs configured".to_string());
    } else {
        lines.push(format!("Staff PINs: {}", directory.len()));
    }
    if roster.is_empty() {
        lines.push("No supervisors configured; audits cannot be verified".to_string());
    } else {
        let names: Vec<&str> = roster.iter().map(StaffName::as_str).collect();
        lines.push(format!("Supervisors ({}): {}", roster.len(), names.join(", ")));
    }
    Ok(lines)
}
