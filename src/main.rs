//! # relay
//!
//! Notification relay binary: loads settings, installs logging and metrics,
//! and serves the WebSocket and HTTP endpoints until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use relay_server::ServerConfig;
use relay_settings::RelaySettings;
use relay_telemetry::TelemetryConfig;
use tracing::info;

/// Real-time fan-out relay for user, vendor and area notifications.
#[derive(Parser, Debug)]
#[command(name = "relay", version, about)]
struct Cli {
    /// Settings file (defaults to `$RELAY_CONFIG`, then `~/.relay/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Apply command-line overrides, the highest-priority layer.
    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings =
        relay_settings::load_settings(cli.config.as_deref()).context("failed to load settings")?;
    cli.apply(&mut settings);

    relay_telemetry::init_telemetry(&TelemetryConfig {
        log_level: settings.logging.level.clone(),
        json: settings.logging.json,
    })
    .context("failed to initialize logging")?;

    let metrics = relay_server::metrics::install_recorder()
        .context("failed to install metrics recorder")?;

    let config = ServerConfig::from(&settings.server);
    let handle = relay_server::start(config, Some(metrics))
        .await
        .with_context(|| format!("failed to bind {}:{}", settings.server.host, settings.server.port))?;
    info!(addr = %handle.addr(), "relay ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    handle.shutdown().await;
    info!("relay stopped");
    Ok(())
}
