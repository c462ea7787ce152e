//! aquastat - Water-Quality Telemetry Analytics
//!
//! # Usage
//!
//! ```bash
//! # Seed from data/cleaned_output.csv (or the raw export) and serve on 127.0.0.1:5000
//! aquastat serve
//!
//! # Normalize and clean a raw export into the cleaned artifact
//! aquastat ingest --input data/2021-dec16.csv --output data/cleaned_output.csv
//! ```
//!
//! # Environment Variables
//!
//! - `AQUASTAT_CONFIG`: Path to a TOML config file (default: ./aquastat.toml)
//! - `AQUASTAT_SERVER_ADDR`: Override the bind address
//! - `RUST_LOG`: Logging level (default: info)
//!
//! # Signals
//!
//! - `SIGHUP`: re-run the raw export through normalize + clean and swap the
//!   result into the running store

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use aquastat::config::{AppConfig, IngestConfig};
use aquastat::ingest::{self, csv_io};
use aquastat::store::{InMemoryCollection, ObservationStore};
use aquastat::{create_app, ApiState};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "aquastat")]
#[command(about = "Water-quality telemetry ingestion, cleaning and analytics service")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides AQUASTAT_CONFIG and ./aquastat.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seed the store if empty and serve the HTTP API (default)
    Serve {
        /// Override the server address (default: "127.0.0.1:5000")
        #[arg(short, long, value_name = "HOST:PORT")]
        addr: Option<String>,
    },

    /// Normalize and z-score clean a raw CSV export, then write the cleaned artifact
    Ingest {
        /// Raw instrument export
        #[arg(long, value_name = "RAW.csv")]
        input: PathBuf,

        /// Cleaned CSV destination
        #[arg(long, value_name = "CLEANED.csv")]
        output: PathBuf,

        /// Rows with any |z| above this are dropped (default from config, 3.0)
        #[arg(long)]
        z_threshold: Option<f64>,
    },
}

// ============================================================================
// Setup
// ============================================================================

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    let mut config = match path {
        Some(p) => AppConfig::load_from_file(p)
            .with_context(|| format!("Failed to load config from {}", p.display()))?,
        None => AppConfig::load(),
    };
    config.apply_env_overrides();
    Ok(config)
}

// ============================================================================
// Commands
// ============================================================================

fn run_ingest(
    config: &AppConfig,
    input: PathBuf,
    output: PathBuf,
    z_threshold: Option<f64>,
) -> Result<()> {
    let z = z_threshold.unwrap_or(config.ingest.z_threshold);
    if !z.is_finite() || z < 0.0 {
        anyhow::bail!("--z-threshold must be a finite value >= 0 (got {z})");
    }

    let outcome = ingest::ingest_raw(&input, z)
        .with_context(|| format!("Failed to ingest {}", input.display()))?;
    csv_io::write_cleaned(&output, &outcome.rows)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        input_rows = outcome.normalize.input_rows,
        dropped_by_normalizer = outcome.normalize.dropped_rows,
        removed_outliers = outcome.cleaning.removed_outliers,
        remaining = outcome.cleaning.remaining_rows,
        output = %output.display(),
        "Ingest complete"
    );
    if let Some(first) = outcome.rows.first() {
        info!(example = ?first, "First cleaned observation");
    }
    Ok(())
}

async fn run_server(config: AppConfig, addr_override: Option<String>) -> Result<()> {
    let addr_str = addr_override.unwrap_or_else(|| config.server.addr.clone());
    let addr: SocketAddr = addr_str
        .parse()
        .with_context(|| format!("Invalid server address '{}'", addr_str))?;

    let store: Arc<dyn ObservationStore> = Arc::new(InMemoryCollection::new());
    let seeded = ingest::seed_if_empty(store.as_ref(), &config.ingest)
        .context("Failed to seed observation store")?;
    info!(rows = seeded.rows(), "Observation store ready");

    spawn_refresh_on_hangup(store.clone(), config.ingest.clone());

    let app = create_app(ApiState::new(store, Arc::new(config)));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("HTTP server listening on http://{}", addr);

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel_token.cancelled().await;
        })
        .await;

    match result {
        Ok(()) => {
            info!("Graceful shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Server error: {}", e);
            Err(anyhow::anyhow!("HTTP server error: {}", e))
        }
    }
}

/// Rebuild the store from the configured sources on SIGHUP.
#[cfg(unix)]
fn spawn_refresh_on_hangup(store: Arc<dyn ObservationStore>, ingest_cfg: IngestConfig) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "SIGHUP handler unavailable; refresh disabled");
            return;
        }
    };

    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("Received SIGHUP, refreshing observation store");
            let store = store.clone();
            let cfg = ingest_cfg.clone();
            let result =
                tokio::task::spawn_blocking(move || ingest::refresh(store.as_ref(), &cfg)).await;
            match result {
                Ok(Ok(report)) => info!(rows = report.rows(), "Refresh complete"),
                Ok(Err(e)) => error!(error = %e, "Refresh failed; previous data kept"),
                Err(e) => error!(error = %e, "Refresh task failed"),
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_refresh_on_hangup(_store: Arc<dyn ObservationStore>, _ingest_cfg: IngestConfig) {}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    let config = load_config(args.config.as_ref())?;

    match args.command.unwrap_or(Command::Serve { addr: None }) {
        Command::Serve { addr } => run_server(config, addr).await,
        Command::Ingest {
            input,
            output,
            z_threshold,
        } => run_ingest(&config, input, output, z_threshold),
    }
}
