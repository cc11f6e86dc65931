//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{HostBlueprint, WatchBehavior};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    app_count: usize,
    watch_count: usize,
    delivery_timeout_ms: u64,
    max_dictionary_bytes: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    app_count: blueprint.apps.len(),
                    watch_count: blueprint.watches.len(),
                    delivery_timeout_ms: blueprint.protocol.delivery_timeout_ms,
                    max_dictionary_bytes: blueprint.protocol.max_dictionary_bytes,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Non-fatal issues worth pointing out
fn collect_warnings(blueprint: &HostBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.apps.is_empty() {
        warnings.push("No apps configured - `run` needs at least one".to_string());
    }
    if blueprint.watches.is_empty() {
        warnings.push("No simulated watches configured - every broadcast will be rejected".to_string());
    }

    let timeout = blueprint.protocol.delivery_timeout_ms;
    for watch in &blueprint.watches {
        if watch.behavior == WatchBehavior::Delayed && watch.delay_ms >= timeout {
            warnings.push(format!(
                "Watch '{}' delays {}ms, at or past the {}ms delivery timeout",
                watch.id, watch.delay_ms, timeout
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Apps: {}", summary.app_count);
            println!("  Watches: {}", summary.watch_count);
            println!("  Delivery timeout: {}ms", summary.delivery_timeout_ms);
            println!("  Max dictionary: {} bytes", summary.max_dictionary_bytes);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
