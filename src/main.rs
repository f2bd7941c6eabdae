//! Battery Manager - IoT fleet battery monitoring.
//!
//! Ingests battery telemetry, derives drain rate and device status, raises
//! threshold alerts and serves fleet summaries over a JSON API.

mod config;
mod db;
mod error;
mod telemetry;
mod web;

use config::ServerConfig;
use db::Store;
use telemetry::TelemetryEngine;
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("battery_manager=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting Battery Manager on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);
    tracing::info!(
        "Thresholds: critical <= {}%, low <= {}%, dedupe alerts: {}",
        cfg.thresholds.critical_pct,
        cfg.thresholds.low_pct,
        cfg.dedupe_alerts
    );

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    let devices = store.list_devices(None)?;
    let active_alerts = store.count_unresolved_alerts()?;
    tracing::info!(
        "Database initialized with {} devices and {} active alerts",
        devices.len(),
        active_alerts
    );

    let engine = Arc::new(TelemetryEngine::new(store, cfg.thresholds, cfg.dedupe_alerts));

    // Start web server
    let server = Server::new(cfg, engine);
    server.start().await?;

    Ok(())
}
