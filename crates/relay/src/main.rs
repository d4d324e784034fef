//! Main application entry point for the relay
//!
//! Loads configuration, installs logging, and runs the WebSocket relay and
//! the static file server until a termination signal arrives.

mod cli;
mod config;
mod logging;
mod signals;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use cli::CliArgs;
use config::AppConfig;
use logging::setup_logging;
use relay_server::RelayServer;
use signals::wait_for_shutdown_signal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// The configured relay, ready to run.
pub struct Application {
    config: AppConfig,
    server: Arc<RelayServer>,
}

impl Application {
    pub async fn new(args: CliArgs) -> Result<Self> {
        // Load configuration first (before logging setup)
        let mut config = AppConfig::load_from_file(&args.config_path)
            .await
            .with_context(|| format!("Failed to load {}", args.config_path.display()))?;
        config.apply_overrides(&args);

        config
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {e}"))?;

        setup_logging(&config.logging)?;

        let server_config = config.to_server_config().map_err(|e| anyhow!(e))?;
        let server = Arc::new(RelayServer::new(server_config));

        info!(
            "🚀 Relay v{} | Config: {}",
            env!("CARGO_PKG_VERSION"),
            args.config_path.display()
        );

        Ok(Self { config, server })
    }

    pub async fn run(self) -> Result<()> {
        info!("📋 Configuration Summary:");
        info!("  🌐 WebSocket address: {}", self.config.server.ws_bind_address);
        info!("  📄 HTTP address: {}", self.config.server.http_bind_address);
        info!("  📂 Document root: {}", self.config.static_files.document_root);

        let listeners = self.server.bind().await?;
        info!("🎮 Ready to accept connections on ws://{}", listeners.ws_addr());
        info!("🌍 Serving files on http://{}", listeners.http_addr());

        let mut server_handle = {
            let server = self.server.clone();
            tokio::spawn(async move { server.serve(listeners).await })
        };

        let monitoring_handle = match self.config.server.health_interval_secs {
            0 => None,
            secs => Some(spawn_health_monitor(
                self.server.clone(),
                Duration::from_secs(secs),
            )),
        };

        info!("🛑 Press Ctrl+C to gracefully shutdown");

        let outcome = tokio::select! {
            signal = wait_for_shutdown_signal() => {
                match signal {
                    Ok(name) => info!("📡 Received {}", name),
                    Err(e) => warn!("Signal handler failed: {}", e),
                }
                info!("🛑 Shutdown signal received, initiating graceful shutdown...");
                self.server.shutdown();
                (&mut server_handle).await
            }
            joined = &mut server_handle => joined,
        };

        if let Some(handle) = monitoring_handle {
            handle.abort();
        }

        let stats = self.server.stats();
        info!("📊 Final Statistics:");
        info!("  - Identities issued: {}", stats.identities_issued);
        info!("  - Messages relayed: {}", stats.messages_relayed);
        info!("  - Deliveries: {}", stats.deliveries);
        info!("  - Malformed dropped: {}", stats.malformed_dropped);

        outcome.context("Server task panicked")??;
        info!("✅ Relay shutdown complete");
        Ok(())
    }
}

fn spawn_health_monitor(
    server: Arc<RelayServer>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately.
        interval.tick().await;
        let mut last_relayed = 0u64;

        loop {
            interval.tick().await;

            let stats = server.stats();
            let relayed_this_period = stats.messages_relayed - last_relayed;
            last_relayed = stats.messages_relayed;

            info!(
                "📊 Relay Health - {} connections | {} messages this period | {} malformed total",
                stats.connections, relayed_this_period, stats.malformed_dropped
            );
        }
    })
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let args = CliArgs::parse();

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("❌ Failed to start application: {:?}", e);
            std::process::exit(1);
        }
    }
}
