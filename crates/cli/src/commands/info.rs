//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{HostBlueprint, ProtocolConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo<'a> {
    version: String,
    protocol: &'a ProtocolConfig,
    apps: Vec<AppInfo>,
    watches: Vec<WatchInfo>,
}

#[derive(Serialize)]
struct AppInfo {
    name: String,
    uuid: String,
}

#[derive(Serialize)]
struct WatchInfo {
    id: String,
    name: String,
    platform: String,
    behavior: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    delay_ms: Option<u64>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let json = serde_json::to_string_pretty(&build_config_info(&blueprint))
            .context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn build_config_info(blueprint: &HostBlueprint) -> ConfigInfo<'_> {
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        protocol: &blueprint.protocol,
        apps: blueprint
            .apps
            .iter()
            .map(|a| AppInfo {
                name: a.name.clone(),
                uuid: a.uuid.to_string(),
            })
            .collect(),
        watches: blueprint
            .watches
            .iter()
            .map(|w| WatchInfo {
                id: w.id.clone(),
                name: w.name.clone(),
                platform: w.platform.clone(),
                behavior: format!("{:?}", w.behavior),
                delay_ms: (w.delay_ms > 0).then_some(w.delay_ms),
            })
            .collect(),
    }
}

fn print_config_info(blueprint: &HostBlueprint) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 watchlink Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let protocol = &blueprint.protocol;
    println!("⚙️  Protocol");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Delivery timeout: {}ms", protocol.delivery_timeout_ms);
    println!("   ├─ Listener timeout: {}ms", protocol.listener_timeout_ms);
    println!("   ├─ Max dictionary: {} bytes", protocol.max_dictionary_bytes);
    println!("   └─ Event queue: {}", protocol.event_queue_capacity);

    println!("\n📦 Apps ({})", blueprint.apps.len());
    for (i, app) in blueprint.apps.iter().enumerate() {
        let prefix = if i == blueprint.apps.len() - 1 { "└─" } else { "├─" };
        println!("   {} {} ({})", prefix, app.name, app.uuid);
    }

    println!("\n⌚ Watches ({})", blueprint.watches.len());
    for (i, watch) in blueprint.watches.iter().enumerate() {
        let prefix = if i == blueprint.watches.len() - 1 { "└─" } else { "├─" };
        let delay = if watch.delay_ms > 0 {
            format!(", {}ms", watch.delay_ms)
        } else {
            String::new()
        };
        println!(
            "   {} {} - {} [{}] ({:?}{})",
            prefix, watch.id, watch.name, watch.platform, watch.behavior, delay
        );
    }

    println!();
}
