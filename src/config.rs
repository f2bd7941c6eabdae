//! Configuration module for the battery manager.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::str::FromStr;

/// Battery levels at which a device is degraded and alerts are raised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// At or below this level a device is critical (default: 15.0)
    pub critical_pct: f64,
    /// At or below this level a device is in warning (default: 30.0)
    pub low_pct: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            critical_pct: 15.0,
            low_pct: 30.0,
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "battery-manager.db")
    pub db_path: String,
    pub thresholds: Thresholds,
    /// Suppress a new alert while an unresolved one of the same type exists (default: false)
    pub dedupe_alerts: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "battery-manager.db".to_string(),
            thresholds: Thresholds::default(),
            dedupe_alerts: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `BATTERY_HTTP_PORT`: HTTP port (default: 8080)
    /// - `BATTERY_DB_PATH`: Database file path (default: "battery-manager.db")
    /// - `BATTERY_CRITICAL_PCT`: critical threshold in percent (default: 15.0)
    /// - `BATTERY_LOW_PCT`: low battery threshold in percent (default: 30.0)
    /// - `BATTERY_DEDUPE_ALERTS`: `true` to suppress duplicate unresolved alerts (default: false)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = parse_var(&lookup, "BATTERY_HTTP_PORT") {
            cfg.http_port = port;
        }

        if let Some(db_path) = lookup("BATTERY_DB_PATH") {
            cfg.db_path = db_path;
        }

        let mut thresholds = cfg.thresholds;
        if let Some(critical) = parse_var(&lookup, "BATTERY_CRITICAL_PCT") {
            thresholds.critical_pct = critical;
        }
        if let Some(low) = parse_var(&lookup, "BATTERY_LOW_PCT") {
            thresholds.low_pct = low;
        }
        if thresholds.critical_pct <= thresholds.low_pct {
            cfg.thresholds = thresholds;
        } else {
            tracing::warn!(
                "Ignoring thresholds: critical {} is above low {}",
                thresholds.critical_pct,
                thresholds.low_pct
            );
        }

        if let Some(dedupe) = parse_var(&lookup, "BATTERY_DEDUPE_ALERTS") {
            cfg.dedupe_alerts = dedupe;
        }

        cfg
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {}={:?}", key, raw);
            None
        }
    }
}
