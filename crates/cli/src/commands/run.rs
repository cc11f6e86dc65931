//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::session::{Session, SessionConfig};

/// Execute the `run` command
pub async fn run_session(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        apps = blueprint.apps.len(),
        watches = blueprint.watches.len(),
        delivery_timeout_ms = blueprint.protocol.delivery_timeout_ms,
        "Configuration loaded"
    );

    let session = Session::new(SessionConfig {
        blueprint,
        app: args.app.clone(),
        messages: args.messages,
        interval: Duration::from_millis(args.interval_ms),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        inbound: args.inbound,
    });

    let shutdown_signal = setup_shutdown_signal();

    tokio::select! {
        result = session.run() => {
            let stats = result.context("Session failed")?;
            info!(
                sends = stats.deliveries.total_sends,
                results = stats.deliveries.total_results,
                duration_secs = stats.duration.as_secs_f64(),
                "Session completed"
            );
            stats.print_summary();
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping session...");
        }
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM. A handler that fails to install never fires.
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
