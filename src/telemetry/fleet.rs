//! Fleet-wide battery summary and export.

use crate::db::{Alert, Device, Health, Store};
use crate::error::Result;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Fleet battery summary. The four health buckets partition the fleet.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FleetStatus {
    pub total_devices: usize,
    pub avg_battery_pct: f64,
    pub healthy: usize,
    pub warning: usize,
    pub low: usize,
    pub critical: usize,
    pub active_alerts: usize,
}

/// Everything an export consumer needs, taken from one snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct FleetExport {
    pub exported_at: DateTime<Utc>,
    pub fleet_status: FleetStatus,
    pub devices: Vec<Device>,
    pub active_alerts: Vec<Alert>,
}

/// Reduce a device list to a fleet summary.
///
/// Buckets come from each device's battery level, not its stored status.
pub fn summarize_devices(devices: &[Device], active_alerts: usize) -> FleetStatus {
    let mut status = FleetStatus {
        total_devices: devices.len(),
        active_alerts,
        ..Default::default()
    };

    for device in devices {
        match device.health() {
            Health::Healthy => status.healthy += 1,
            Health::Warning => status.warning += 1,
            Health::Low => status.low += 1,
            Health::Critical => status.critical += 1,
        }
    }

    if !devices.is_empty() {
        let sum: f64 = devices.iter().map(|d| d.current_pct).sum();
        let avg = sum / devices.len() as f64;
        status.avg_battery_pct = (avg * 10.0).round() / 10.0;
    }

    status
}

/// Summarize the fleet as currently stored.
pub fn summarize(store: &Store) -> Result<FleetStatus> {
    let snapshot = store.snapshot(false)?;
    Ok(summarize_devices(
        &snapshot.devices,
        snapshot.active_alerts as usize,
    ))
}

/// Build the export document: summary, devices (lowest battery first) and
/// unresolved alerts (newest first).
pub fn export(store: &Store, now: DateTime<Utc>) -> Result<FleetExport> {
    let snapshot = store.snapshot(true)?;
    let fleet_status = summarize_devices(&snapshot.devices, snapshot.unresolved_alerts.len());
    tracing::info!(
        "Exporting {} devices and {} active alerts",
        fleet_status.total_devices,
        fleet_status.active_alerts
    );
    Ok(FleetExport {
        exported_at: now,
        fleet_status,
        devices: snapshot.devices,
        active_alerts: snapshot.unresolved_alerts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Thresholds;
    use crate::db::{DeviceStatus, DeviceType, NewDevice};
    use crate::telemetry::{IngestRequest, TelemetryEngine};
    use chrono::TimeZone;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn device(current_pct: f64) -> Device {
        let now = Utc::now();
        Device {
            id: 1,
            name: "d".to_string(),
            device_type: DeviceType::Sensor,
            location: "x".to_string(),
            battery_type: Default::default(),
            battery_capacity_mah: 2000,
            current_pct,
            last_seen: now,
            // Deliberately stale: buckets must ignore it.
            status: DeviceStatus::Online,
            firmware_version: "1.0.0".to_string(),
            notes: String::new(),
            created_at: now,
        }
    }

    #[test]
    fn test_empty_fleet() {
        let status = summarize_devices(&[], 0);
        assert_eq!(status, FleetStatus::default());
        assert_eq!(status.avg_battery_pct, 0.0);
    }

    #[test]
    fn test_buckets_partition_fleet() {
        let levels = [100.0, 60.0, 59.9, 30.0, 29.9, 15.0, 14.9, 0.0];
        let devices: Vec<Device> = levels.iter().map(|&p| device(p)).collect();
        let status = summarize_devices(&devices, 3);

        assert_eq!(status.total_devices, 8);
        assert_eq!(status.healthy, 2);
        assert_eq!(status.warning, 2);
        assert_eq!(status.low, 2);
        assert_eq!(status.critical, 2);
        assert_eq!(
            status.healthy + status.warning + status.low + status.critical,
            status.total_devices
        );
        assert_eq!(status.active_alerts, 3);
    }

    #[test]
    fn test_average_rounds_to_one_decimal() {
        let devices = vec![device(10.0), device(20.0), device(20.5)];
        assert_eq!(summarize_devices(&devices, 0).avg_battery_pct, 16.8);
    }

    #[test]
    fn test_summarize_and_export_from_store() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());
        let engine = TelemetryEngine::new(store.clone(), Thresholds::default(), false);

        let a = engine.register(NewDevice::new("a", DeviceType::Sensor, "x")).unwrap();
        let b = engine.register(NewDevice::new("b", DeviceType::Gateway, "x")).unwrap();
        engine.register(NewDevice::new("c", DeviceType::Actuator, "x")).unwrap();
        engine.ingest(a.id, &IngestRequest::new(20.0)).unwrap();
        engine.ingest(b.id, &IngestRequest::new(45.0)).unwrap();

        let status = summarize(&store).unwrap();
        assert_eq!(status.total_devices, 3);
        assert_eq!(status.healthy, 1);
        assert_eq!(status.warning, 1);
        assert_eq!(status.low, 1);
        assert_eq!(status.critical, 0);
        assert_eq!(status.avg_battery_pct, 55.0);
        assert_eq!(status.active_alerts, 1);

        let at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let doc = export(&store, at).unwrap();
        assert_eq!(doc.exported_at, at);
        assert_eq!(doc.fleet_status, status);
        let names: Vec<&str> = doc.devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(doc.active_alerts.len(), 1);
        assert_eq!(doc.active_alerts[0].device_id, a.id);

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["fleet_status"]["low"], 1);
        assert_eq!(json["active_alerts"][0]["alert_type"], "low_battery");
    }
}
