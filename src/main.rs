//! Parking monitor - geofence matching and occupancy tracking service
//!
//! Matches vehicle positions against polygon regions on demand and keeps a
//! per-(vehicle, region) counter of consecutive confirming passes.
//!
//! Module structure:
//! - `domain/` - Core types, geometry kernel, boundary parsing
//! - `io/` - Store accessors, in-memory store, HTTP API
//! - `services/` - Matching engine and occupancy transitions
//! - `infra/` - Infrastructure (Config, Metrics)

use clap::Parser;
use parking_monitor::infra::{Config, Metrics};
use parking_monitor::io::{start_api_server, ApiState, MemoryStore};
use parking_monitor::services::MatchingEngine;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Parking monitor - geofence matching service
#[derive(Parser, Debug)]
#[command(name = "parking-monitor", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Default: INFO, use RUST_LOG=debug for per-vehicle transitions
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = %env!("GIT_HASH"), "parking-monitor starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        site_id = %config.site_id(),
        http_bind_address = %config.http_bind_address(),
        http_port = %config.http_port(),
        busy_policy = %config.busy_policy().as_str(),
        accessor_timeout_ms = %config.accessor_timeout_ms(),
        seed_file = ?config.seed_file(),
        "config_loaded"
    );

    let store = match config.seed_file() {
        Some(path) => match MemoryStore::from_seed_file(path) {
            Ok(store) => store,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "seed_load_failed");
                MemoryStore::new()
            }
        },
        None => MemoryStore::new(),
    };
    let store = Arc::new(store);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let metrics = Arc::new(Metrics::new());

    let engine = Arc::new(MatchingEngine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        &config,
        metrics.clone(),
        shutdown_rx.clone(),
    ));

    // Start metrics reporter
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs().max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        // First tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    let state = Arc::new(ApiState {
        engine,
        store,
        metrics,
        site_id: config.site_id().to_string(),
    });

    let port = config.http_port();
    if port > 0 {
        // Runs until shutdown
        if let Err(e) =
            start_api_server(config.http_bind_address(), port, state, shutdown_rx).await
        {
            error!(error = %e, "api_server_error");
        }
    } else {
        warn!("http_disabled");
        let mut shutdown = shutdown_rx;
        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }
    }

    info!("parking-monitor shutdown complete");
    Ok(())
}
