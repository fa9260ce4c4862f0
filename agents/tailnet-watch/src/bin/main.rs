//! Tailnet Watch Agent entry point
//!
//! Device liveness monitoring for a Tailscale tailnet with Telegram alerts.

use chrono::Utc;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tailnet_watch::config::MonitorConfig;
use tailnet_watch::contracts::*;
use tailnet_watch::engine::{run_scheduled, Monitor};
use tailnet_watch::handler::{create_router, AppState};
use tailnet_watch::telemetry::MonitorMetrics;
use tailnet_watch_core::{KvStore, SledStore, StatusStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tailnet-watch")]
#[command(about = "Tailnet Watch Agent - device liveness monitoring with Telegram alerts")]
#[command(version)]
struct Cli {
    /// Config file (YAML or TOML); environment variables are used when absent
    #[arg(short, long, global = true, env = "TAILNET_WATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run cycles on the poll interval and serve the status endpoint
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080", env = "PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },

    /// Run a single reconciliation cycle and print its report
    Run,

    /// Print the stored status of every device
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let cli = Cli::parse();

    let config = match MonitorConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    tracing::debug!(config = ?config, "Configuration loaded");

    let kv: Arc<dyn KvStore> = Arc::new(SledStore::open(&config.store_path)?);

    match cli.command {
        Commands::Serve { port, host } => {
            let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
            let metrics = Arc::new(MonitorMetrics::new()?);
            let state = Arc::new(AppState::new(
                StatusStore::new(Arc::clone(&kv)),
                config.status_secret().map(str::to_string),
                Arc::clone(&metrics),
            ));
            let router = create_router(state);

            tracing::info!("Starting Tailnet Watch Agent on {}", addr);
            tracing::info!("Agent ID: {}, Version: {}", AGENT_ID, AGENT_VERSION);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            let server = async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(shutdown_signal())
                    .await
            };
            let scheduler = run_scheduled(
                cli.config.clone(),
                config.poll_interval(),
                Arc::clone(&kv),
                metrics,
                shutdown_signal(),
            );

            let (served, ()) = tokio::join!(server, scheduler);
            served?;
        }

        Commands::Run => {
            let monitor = Monitor::from_config(&config, Arc::clone(&kv));
            let report = monitor.run_cycle(Utc::now()).await;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if !report.is_completed() {
                std::process::exit(1);
            }
        }

        Commands::Status => {
            let entries = StatusStore::new(kv).snapshot().await?;
            let response = StatusResponse {
                success: true,
                data: entries.iter().map(NodeStatusView::from).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
