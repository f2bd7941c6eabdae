//! Telemetry ingestion and alerting.
//!
//! The engine turns a raw battery reading into derived device state: drain
//! rate against the previous reading, device status, and threshold alerts.

mod fleet;
mod policy;

pub use fleet::*;
pub use policy::*;

use crate::config::Thresholds;
use crate::db::{
    Device, DeviceStatus, DbError, Health, NewDevice, NewReading, PriorReading, Reading, Store,
};
use crate::error::{BatteryError, Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A battery reading as reported by a device.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestRequest {
    pub battery_pct: f64,
    #[serde(default)]
    pub voltage_mv: Option<f64>,
    #[serde(default)]
    pub temperature_c: Option<f64>,
    #[serde(default)]
    pub signal_rssi: Option<i64>,
}

impl IngestRequest {
    #[cfg(test)]
    pub fn new(battery_pct: f64) -> Self {
        Self {
            battery_pct,
            ..Default::default()
        }
    }
}

/// A device together with figures derived from its latest reading.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceDetail {
    pub device: Device,
    pub health: Health,
    pub reading_count: i64,
    /// Drain rate of the latest reading, percent per hour.
    pub drain_rate: Option<f64>,
    pub days_remaining: Option<f64>,
}

/// Derive the status for a battery level. Never yields `Offline`.
pub fn derive_status(battery_pct: f64, thresholds: &Thresholds) -> DeviceStatus {
    if battery_pct <= thresholds.critical_pct {
        DeviceStatus::Critical
    } else if battery_pct <= thresholds.low_pct {
        DeviceStatus::Warning
    } else {
        DeviceStatus::Online
    }
}

/// Percent per hour lost since the prior reading, rounded to 4 decimals.
///
/// `None` without a prior reading, with an unparseable prior timestamp, or
/// when no time has elapsed.
pub fn drain_rate(prior: Option<&PriorReading>, battery_pct: f64, at: DateTime<Utc>) -> Option<f64> {
    let prior = prior?;
    let prior_time = prior.reading_time?;
    let elapsed_hours = (at - prior_time).num_milliseconds() as f64 / 3_600_000.0;
    if elapsed_hours <= 0.0 {
        return None;
    }
    let rate = (prior.battery_pct - battery_pct) / elapsed_hours;
    Some((rate * 10_000.0).round() / 10_000.0)
}

/// Registers devices and applies battery readings to them.
pub struct TelemetryEngine {
    store: Arc<Store>,
    thresholds: Thresholds,
    policy: AlertPolicy,
    dedupe_alerts: bool,
    device_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl TelemetryEngine {
    pub fn new(store: Arc<Store>, thresholds: Thresholds, dedupe_alerts: bool) -> Self {
        Self {
            store,
            thresholds,
            policy: AlertPolicy::new(thresholds),
            dedupe_alerts,
            device_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Register a new device with a full battery.
    pub fn register(&self, mut device: NewDevice) -> Result<Device> {
        device.name = device.name.trim().to_string();
        if device.name.is_empty() {
            return Err(BatteryError::InvalidInput("device name cannot be empty".to_string()));
        }
        if device.battery_capacity_mah <= 0 {
            return Err(BatteryError::InvalidInput(format!(
                "battery capacity {} mAh must be positive",
                device.battery_capacity_mah
            )));
        }

        let created = self.store.create_device(&device, Utc::now())?;
        tracing::info!(
            "Registered device [{}] {} ({})",
            created.id,
            created.name,
            created.device_type
        );
        Ok(created)
    }

    /// Record a reading taken now.
    pub fn ingest(&self, device_id: i64, request: &IngestRequest) -> Result<Reading> {
        self.ingest_at(device_id, request, Utc::now())
    }

    /// Record a reading taken at `at`.
    ///
    /// The reading insert and the device update are one transaction. Readings
    /// for the same device, and the alerts they raise, are applied one at a
    /// time. Alert failures are logged and never fail the ingestion.
    pub fn ingest_at(&self, device_id: i64, request: &IngestRequest, at: DateTime<Utc>) -> Result<Reading> {
        let pct = request.battery_pct;
        if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
            return Err(BatteryError::InvalidInput(format!(
                "battery_pct {} out of range [0, 100]",
                pct
            )));
        }

        self.store
            .get_device(device_id)
            .map_err(|e| BatteryError::from_db(e, "device", device_id))?;

        let lock = self.device_lock(device_id)?;
        let guard = lock
            .lock()
            .map_err(|_| BatteryError::StoreUnavailable(DbError::Poisoned))?;

        let prior = self.store.latest_reading(device_id)?;
        let reading = NewReading {
            device_id,
            reading_time: at,
            battery_pct: pct,
            voltage_mv: request.voltage_mv,
            temperature_c: request.temperature_c,
            signal_rssi: request.signal_rssi,
            drain_rate: drain_rate(prior.as_ref(), pct, at),
        };
        let status = derive_status(pct, &self.thresholds);

        // The device may have been deleted since the existence check.
        let reading = self.store.commit_reading(&reading, status).map_err(|e| {
            if matches!(e, DbError::NotFound) {
                self.release_lock(device_id);
            }
            BatteryError::from_db(e, "device", device_id)
        })?;

        tracing::debug!(
            "Device {} reading {:.1}% drain={:?} status={}",
            device_id,
            pct,
            reading.drain_rate,
            status
        );

        self.raise_alert(device_id, pct, at);
        drop(guard);
        Ok(reading)
    }

    /// Put a device into the externally managed offline state.
    pub fn mark_offline(&self, device_id: i64) -> Result<Device> {
        let device = self
            .store
            .set_device_status(device_id, DeviceStatus::Offline)
            .map_err(|e| BatteryError::from_db(e, "device", device_id))?;
        tracing::info!("Device [{}] {} marked offline", device.id, device.name);
        Ok(device)
    }

    /// Delete a device with its readings and alerts.
    pub fn delete_device(&self, device_id: i64) -> Result<()> {
        self.store
            .delete_device(device_id)
            .map_err(|e| BatteryError::from_db(e, "device", device_id))?;
        self.release_lock(device_id);
        tracing::info!("Deleted device {}", device_id);
        Ok(())
    }

    /// Recent readings of a device, newest first.
    pub fn reading_history(&self, device_id: i64, limit: i64) -> Result<Vec<Reading>> {
        if limit <= 0 {
            return Err(BatteryError::InvalidInput(format!("limit {} must be positive", limit)));
        }
        self.store
            .get_device(device_id)
            .map_err(|e| BatteryError::from_db(e, "device", device_id))?;
        Ok(self.store.list_readings(device_id, limit)?)
    }

    /// Device with health, reading count and a days-remaining estimate.
    pub fn device_detail(&self, device_id: i64) -> Result<DeviceDetail> {
        let device = self
            .store
            .get_device(device_id)
            .map_err(|e| BatteryError::from_db(e, "device", device_id))?;
        let reading_count = self.store.count_readings(device_id)?;
        let drain_rate = self
            .store
            .latest_reading(device_id)?
            .and_then(|r| r.drain_rate);
        let days_remaining = drain_rate.and_then(|hourly| device.days_remaining(hourly * 24.0));

        Ok(DeviceDetail {
            health: device.health(),
            device,
            reading_count,
            drain_rate,
            days_remaining,
        })
    }

    fn raise_alert(&self, device_id: i64, battery_pct: f64, at: DateTime<Utc>) {
        let Some(alert) = self.policy.evaluate(device_id, battery_pct) else {
            return;
        };

        if self.dedupe_alerts {
            match self.store.has_unresolved_alert(device_id, alert.alert_type) {
                Ok(true) => {
                    tracing::debug!(
                        "Suppressing {} alert for device {}: unresolved alert exists",
                        alert.alert_type,
                        device_id
                    );
                    return;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!("Failed to check alerts for device {}: {}", device_id, e);
                    return;
                }
            }
        }

        match self.store.insert_alert(&alert, at) {
            Ok(stored) => tracing::warn!("Device {}: {}", device_id, stored.message),
            Err(e) => tracing::error!(
                "Failed to record {} alert for device {}: {}",
                alert.alert_type,
                device_id,
                e
            ),
        }
    }

    fn device_lock(&self, device_id: i64) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .device_locks
            .lock()
            .map_err(|_| BatteryError::StoreUnavailable(DbError::Poisoned))?;
        Ok(locks.entry(device_id).or_default().clone())
    }

    fn release_lock(&self, device_id: i64) {
        if let Ok(mut locks) = self.device_locks.lock() {
            locks.remove(&device_id);
        }
    }
}
