//! banca-server - HTTP entry point

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use banca_core::config::Config;
use banca_core::services::{EntryPoint, LogEvent, LoggingService};
use banca_core::BancaContext;
use banca_server::{router, AppState};

#[derive(Parser)]
#[command(name = "banca-server")]
#[command(about = "REST API for bank administration", version)]
struct Args {
    /// Data directory holding banca.duckdb, logs.duckdb and settings.json
    #[arg(long, env = "BANCA_DIR")]
    data_dir: Option<PathBuf>,

    /// Address to bind (overrides settings.json)
    #[arg(long, env = "BANCA_HOST")]
    host: Option<String>,

    /// Port to bind (overrides settings.json)
    #[arg(long, env = "BANCA_PORT")]
    port: Option<u16>,
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".banca")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,banca_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let data_dir = args.data_dir.unwrap_or_else(default_data_dir);

    let mut config = Config::load(&data_dir)
        .with_context(|| format!("Failed to load settings from {}", data_dir.display()))?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    let bind_address = config.bind_address();

    let ctx = BancaContext::with_config(&data_dir, config)
        .with_context(|| format!("Failed to open database in {}", data_dir.display()))?;
    tracing::info!(
        data_dir = %data_dir.display(),
        transfer_audit = %ctx.config.transfer_audit,
        "database ready"
    );

    let logger = match LoggingService::new(&data_dir, EntryPoint::Api, env!("CARGO_PKG_VERSION")) {
        Ok(logger) => Some(logger),
        Err(e) => {
            tracing::warn!("operational log unavailable: {}", e);
            None
        }
    };

    let state = AppState::new(ctx, logger);
    state.log_event(LogEvent::new("server_started"));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;
    tracing::info!("listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
}
