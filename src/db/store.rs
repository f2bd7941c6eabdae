//! SQLite database store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::models::*;

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Not found")]
    NotFound,
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Database lock poisoned")]
    Poisoned,
}

/// Storage format for timestamps. Lexicographic order equals time order.
const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

const DEVICE_COLUMNS: &str = "id, name, device_type, location, battery_type, battery_capacity_mah, \
     current_pct, last_seen, status, firmware_version, notes, created_at";

const ALERT_COLUMNS: &str =
    "id, device_id, alert_type, threshold, current_value, message, resolved, created_at";

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    // --- Devices ---

    /// Insert a new device with a full battery and return it.
    pub fn create_device(&self, device: &NewDevice, now: DateTime<Utc>) -> Result<Device, DbError> {
        let conn = self.conn()?;
        let ts = format_db_time(now);
        conn.execute(
            "INSERT INTO devices (name, device_type, location, battery_type, battery_capacity_mah, \
             current_pct, last_seen, status, firmware_version, notes, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, 100.0, ?6, ?7, ?8, ?9, ?6)",
            params![
                device.name,
                device.device_type,
                device.location,
                device.battery_type,
                device.battery_capacity_mah,
                ts,
                DeviceStatus::Online,
                device.firmware_version,
                device.notes,
            ],
        )
        .map_err(|e| unique_violation(e, format!("device name already registered: {}", device.name)))?;

        query_device(&conn, conn.last_insert_rowid())
    }

    /// Get a device by ID.
    pub fn get_device(&self, id: i64) -> Result<Device, DbError> {
        let conn = self.conn()?;
        query_device(&conn, id)
    }

    /// List devices, lowest battery first, optionally filtered by status.
    pub fn list_devices(&self, status: Option<DeviceStatus>) -> Result<Vec<Device>, DbError> {
        let conn = self.conn()?;
        query_devices(&conn, status)
    }

    /// Overwrite a device's status without touching its battery level.
    pub fn set_device_status(&self, id: i64, status: DeviceStatus) -> Result<Device, DbError> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE devices SET status = ?1 WHERE id = ?2",
            params![status, id],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound);
        }
        query_device(&conn, id)
    }

    /// Delete a device and everything recorded for it.
    pub fn delete_device(&self, id: i64) -> Result<(), DbError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM alerts WHERE device_id = ?1", params![id])?;
        tx.execute("DELETE FROM readings WHERE device_id = ?1", params![id])?;
        let deleted = tx.execute("DELETE FROM devices WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(DbError::NotFound);
        }
        tx.commit()?;
        Ok(())
    }

    // --- Readings ---

    /// Get the most recent reading for a device.
    pub fn latest_reading(&self, device_id: i64) -> Result<Option<PriorReading>, DbError> {
        let conn = self.conn()?;
        let prior = conn
            .query_row(
                "SELECT battery_pct, reading_time, drain_rate FROM readings \
                 WHERE device_id = ?1 ORDER BY reading_time DESC, id DESC LIMIT 1",
                params![device_id],
                |row| {
                    let time_str: String = row.get(1)?;
                    Ok(PriorReading {
                        battery_pct: row.get(0)?,
                        reading_time: parse_db_time(&time_str),
                        drain_rate: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(prior)
    }

    /// Insert a reading and apply it to its device in one transaction.
    ///
    /// Fails with `NotFound` (and writes nothing) if the device does not exist.
    pub fn commit_reading(&self, reading: &NewReading, status: DeviceStatus) -> Result<Reading, DbError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let ts = format_db_time(reading.reading_time);

        let updated = tx.execute(
            "UPDATE devices SET current_pct = ?1, last_seen = ?2, status = ?3 WHERE id = ?4",
            params![reading.battery_pct, ts, status, reading.device_id],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound);
        }

        tx.execute(
            "INSERT INTO readings (device_id, reading_time, battery_pct, voltage_mv, temperature_c, signal_rssi, drain_rate) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                reading.device_id,
                ts,
                reading.battery_pct,
                reading.voltage_mv,
                reading.temperature_c,
                reading.signal_rssi,
                reading.drain_rate,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(Reading {
            id,
            device_id: reading.device_id,
            reading_time: reading.reading_time,
            battery_pct: reading.battery_pct,
            voltage_mv: reading.voltage_mv,
            temperature_c: reading.temperature_c,
            signal_rssi: reading.signal_rssi,
            drain_rate: reading.drain_rate,
        })
    }

    /// Count readings recorded for a device.
    pub fn count_readings(&self, device_id: i64) -> Result<i64, DbError> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM readings WHERE device_id = ?1",
            params![device_id],
            |r| r.get(0),
        )?)
    }

    /// Most recent readings for a device, newest first.
    pub fn list_readings(&self, device_id: i64, limit: i64) -> Result<Vec<Reading>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, device_id, reading_time, battery_pct, voltage_mv, temperature_c, signal_rssi, drain_rate \
             FROM readings WHERE device_id = ?1 ORDER BY reading_time DESC, id DESC LIMIT ?2",
        )?;
        let readings = stmt
            .query_map(params![device_id, limit], reading_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(readings)
    }

    // --- Alerts ---

    /// Persist a new unresolved alert.
    pub fn insert_alert(&self, alert: &NewAlert, now: DateTime<Utc>) -> Result<Alert, DbError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO alerts (device_id, alert_type, threshold, current_value, message, resolved, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
            params![
                alert.device_id,
                alert.alert_type,
                alert.threshold,
                alert.current_value,
                alert.message,
                format_db_time(now),
            ],
        )?;
        query_alert(&conn, conn.last_insert_rowid())
    }

    /// Whether the device already has an unresolved alert of this type.
    pub fn has_unresolved_alert(&self, device_id: i64, alert_type: AlertType) -> Result<bool, DbError> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM alerts WHERE device_id = ?1 AND alert_type = ?2 AND resolved = 0)",
            params![device_id, alert_type],
            |r| r.get(0),
        )?)
    }

    /// Count unresolved alerts across the fleet.
    pub fn count_unresolved_alerts(&self) -> Result<i64, DbError> {
        let conn = self.conn()?;
        count_unresolved(&conn)
    }

    /// List unresolved alerts, newest first.
    pub fn list_unresolved_alerts(&self) -> Result<Vec<Alert>, DbError> {
        let conn = self.conn()?;
        query_unresolved_alerts(&conn)
    }

    /// Mark an alert resolved.
    pub fn resolve_alert(&self, id: i64) -> Result<Alert, DbError> {
        let conn = self.conn()?;
        let updated = conn.execute("UPDATE alerts SET resolved = 1 WHERE id = ?1", params![id])?;
        if updated == 0 {
            return Err(DbError::NotFound);
        }
        query_alert(&conn, id)
    }

    // --- Fleet ---

    /// Read all devices and the unresolved alert count in one transaction.
    ///
    /// With `with_alerts`, the unresolved alerts themselves are loaded too.
    pub fn snapshot(&self, with_alerts: bool) -> Result<FleetSnapshot, DbError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let devices = query_devices(&tx, None)?;
        let (active_alerts, unresolved_alerts) = if with_alerts {
            let alerts = query_unresolved_alerts(&tx)?;
            (alerts.len() as i64, alerts)
        } else {
            (count_unresolved(&tx)?, Vec::new())
        };
        tx.commit()?;
        Ok(FleetSnapshot {
            devices,
            active_alerts,
            unresolved_alerts,
        })
    }
}

fn query_device(conn: &Connection, id: i64) -> Result<Device, DbError> {
    conn.query_row(
        &format!("SELECT {} FROM devices WHERE id = ?1", DEVICE_COLUMNS),
        params![id],
        device_from_row,
    )
    .optional()?
    .ok_or(DbError::NotFound)
}

fn query_devices(conn: &Connection, status: Option<DeviceStatus>) -> Result<Vec<Device>, DbError> {
    let devices = match status {
        Some(status) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM devices WHERE status = ?1 ORDER BY current_pct ASC, id ASC",
                DEVICE_COLUMNS
            ))?;
            let rows = stmt.query_map(params![status], device_from_row)?;
            rows.collect::<SqlResult<Vec<_>>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM devices ORDER BY current_pct ASC, id ASC",
                DEVICE_COLUMNS
            ))?;
            let rows = stmt.query_map([], device_from_row)?;
            rows.collect::<SqlResult<Vec<_>>>()?
        }
    };
    Ok(devices)
}

fn query_alert(conn: &Connection, id: i64) -> Result<Alert, DbError> {
    conn.query_row(
        &format!("SELECT {} FROM alerts WHERE id = ?1", ALERT_COLUMNS),
        params![id],
        alert_from_row,
    )
    .optional()?
    .ok_or(DbError::NotFound)
}

fn query_unresolved_alerts(conn: &Connection) -> Result<Vec<Alert>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM alerts WHERE resolved = 0 ORDER BY created_at DESC, id DESC",
        ALERT_COLUMNS
    ))?;
    let alerts = stmt
        .query_map([], alert_from_row)?
        .collect::<SqlResult<Vec<_>>>()?;
    Ok(alerts)
}

fn count_unresolved(conn: &Connection) -> Result<i64, DbError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM alerts WHERE resolved = 0", [], |r| r.get(0))?)
}

fn device_from_row(row: &Row<'_>) -> SqlResult<Device> {
    let last_seen: String = row.get(7)?;
    let created_at: String = row.get(11)?;
    Ok(Device {
        id: row.get(0)?,
        name: row.get(1)?,
        device_type: row.get(2)?,
        location: row.get(3)?,
        battery_type: row.get(4)?,
        battery_capacity_mah: row.get(5)?,
        current_pct: row.get(6)?,
        last_seen: stored_time("devices.last_seen", &last_seen),
        status: row.get(8)?,
        firmware_version: row.get(9)?,
        notes: row.get(10)?,
        created_at: stored_time("devices.created_at", &created_at),
    })
}

fn reading_from_row(row: &Row<'_>) -> SqlResult<Reading> {
    let reading_time: String = row.get(2)?;
    Ok(Reading {
        id: row.get(0)?,
        device_id: row.get(1)?,
        reading_time: stored_time("readings.reading_time", &reading_time),
        battery_pct: row.get(3)?,
        voltage_mv: row.get(4)?,
        temperature_c: row.get(5)?,
        signal_rssi: row.get(6)?,
        drain_rate: row.get(7)?,
    })
}

fn alert_from_row(row: &Row<'_>) -> SqlResult<Alert> {
    let created_at: String = row.get(7)?;
    Ok(Alert {
        id: row.get(0)?,
        device_id: row.get(1)?,
        alert_type: row.get(2)?,
        threshold: row.get(3)?,
        current_value: row.get(4)?,
        message: row.get(5)?,
        resolved: row.get(6)?,
        created_at: stored_time("alerts.created_at", &created_at),
    })
}

/// Parse a stored timestamp, falling back to the epoch so that a corrupt
/// value reads back the same every time.
fn stored_time(column: &str, raw: &str) -> DateTime<Utc> {
    parse_db_time(raw).unwrap_or_else(|| {
        tracing::warn!("Unparseable timestamp {:?} in {}, using epoch", raw, column);
        DateTime::<Utc>::default()
    })
}

/// Map a UNIQUE constraint failure to `Conflict`, anything else stays a SQLite error.
fn unique_violation(err: rusqlite::Error, message: String) -> DbError {
    if let rusqlite::Error::SqliteFailure(e, _) = &err {
        if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE {
            return DbError::Conflict(message);
        }
    }
    DbError::Sqlite(err)
}

/// Format a timestamp for storage.
pub fn format_db_time(t: DateTime<Utc>) -> String {
    t.format(DB_TIME_FORMAT).to_string()
}

/// Parse a datetime string from the database.
pub fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    // Try various formats
    let formats = [
        DB_TIME_FORMAT,
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    // Try ISO 8601
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::NamedTempFile;

    fn open() -> (NamedTempFile, Store) {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        (tmp, store)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn reading(device_id: i64, pct: f64, at: DateTime<Utc>) -> NewReading {
        NewReading {
            device_id,
            reading_time: at,
            battery_pct: pct,
            voltage_mv: Some(3700.0),
            temperature_c: None,
            signal_rssi: Some(-70),
            drain_rate: None,
        }
    }

    fn alert(device_id: i64, alert_type: AlertType, pct: f64) -> NewAlert {
        NewAlert {
            device_id,
            alert_type,
            threshold: 30.0,
            current_value: pct,
            message: format!("Battery low: {:.1}%", pct),
        }
    }

    #[test]
    fn test_device_crud() {
        let (_tmp, store) = open();

        let mut new = NewDevice::new("sensor-1", DeviceType::Sensor, "roof");
        new.battery_type = BatteryType::LiFePO4;
        let device = store.create_device(&new, t0()).unwrap();
        assert!(device.id > 0);
        assert_eq!(device.current_pct, 100.0);
        assert_eq!(device.status, DeviceStatus::Online);
        assert_eq!(device.battery_type, BatteryType::LiFePO4);
        assert_eq!(device.created_at, t0());
        assert_eq!(device.last_seen, t0());

        let fetched = store.get_device(device.id).unwrap();
        assert_eq!(fetched.name, "sensor-1");
        assert_eq!(fetched.location, "roof");

        let offline = store.set_device_status(device.id, DeviceStatus::Offline).unwrap();
        assert_eq!(offline.status, DeviceStatus::Offline);
        assert_eq!(offline.current_pct, 100.0);

        store.delete_device(device.id).unwrap();
        assert!(matches!(store.get_device(device.id), Err(DbError::NotFound)));
        assert!(matches!(store.delete_device(device.id), Err(DbError::NotFound)));
    }

    #[test]
    fn test_duplicate_name_is_conflict() {
        let (_tmp, store) = open();
        let new = NewDevice::new("gw", DeviceType::Gateway, "lab");
        store.create_device(&new, t0()).unwrap();
        let err = store.create_device(&new, t0()).unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)), "got {:?}", err);
    }

    #[test]
    fn test_list_devices_sorted_and_filtered() {
        let (_tmp, store) = open();
        let a = store.create_device(&NewDevice::new("a", DeviceType::Sensor, "x"), t0()).unwrap();
        let b = store.create_device(&NewDevice::new("b", DeviceType::Camera, "x"), t0()).unwrap();
        let c = store.create_device(&NewDevice::new("c", DeviceType::Tracker, "x"), t0()).unwrap();

        store.commit_reading(&reading(a.id, 55.0, t0()), DeviceStatus::Online).unwrap();
        store.commit_reading(&reading(b.id, 12.0, t0()), DeviceStatus::Critical).unwrap();

        let all: Vec<String> = store
            .list_devices(None)
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(all, vec!["b", "a", "c"]);

        let critical = store.list_devices(Some(DeviceStatus::Critical)).unwrap();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].id, b.id);
        assert_eq!(store.get_device(c.id).unwrap().current_pct, 100.0);
    }

    #[test]
    fn test_commit_reading_updates_device() {
        let (_tmp, store) = open();
        let d = store.create_device(&NewDevice::new("s", DeviceType::Sensor, "x"), t0()).unwrap();

        let at = t0() + Duration::minutes(5);
        let r = store.commit_reading(&reading(d.id, 25.0, at), DeviceStatus::Warning).unwrap();
        assert!(r.id > 0);
        assert_eq!(r.signal_rssi, Some(-70));

        let device = store.get_device(d.id).unwrap();
        assert_eq!(device.current_pct, 25.0);
        assert_eq!(device.status, DeviceStatus::Warning);
        assert_eq!(device.last_seen, at);
        assert_eq!(store.count_readings(d.id).unwrap(), 1);
    }

    #[test]
    fn test_commit_reading_unknown_device_writes_nothing() {
        let (_tmp, store) = open();
        let err = store.commit_reading(&reading(42, 50.0, t0()), DeviceStatus::Online).unwrap_err();
        assert!(matches!(err, DbError::NotFound));
        assert_eq!(store.count_readings(42).unwrap(), 0);
    }

    #[test]
    fn test_latest_reading() {
        let (_tmp, store) = open();
        let d = store.create_device(&NewDevice::new("s", DeviceType::Sensor, "x"), t0()).unwrap();
        assert!(store.latest_reading(d.id).unwrap().is_none());

        store.commit_reading(&reading(d.id, 90.0, t0() + Duration::hours(2)), DeviceStatus::Online).unwrap();
        store.commit_reading(&reading(d.id, 95.0, t0()), DeviceStatus::Online).unwrap();

        let prior = store.latest_reading(d.id).unwrap().unwrap();
        assert_eq!(prior.battery_pct, 90.0);
        assert_eq!(prior.reading_time, Some(t0() + Duration::hours(2)));
    }

    #[test]
    fn test_latest_reading_with_malformed_time() {
        let (_tmp, store) = open();
        let d = store.create_device(&NewDevice::new("s", DeviceType::Sensor, "x"), t0()).unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO readings (device_id, reading_time, battery_pct) VALUES (?1, 'not-a-time', 70.0)",
                params![d.id],
            )
            .unwrap();

        let prior = store.latest_reading(d.id).unwrap().unwrap();
        assert_eq!(prior.battery_pct, 70.0);
        assert!(prior.reading_time.is_none());
    }

    #[test]
    fn test_list_readings_newest_first() {
        let (_tmp, store) = open();
        let d = store.create_device(&NewDevice::new("s", DeviceType::Sensor, "x"), t0()).unwrap();
        for (h, pct) in [(0, 90.0), (2, 70.0), (1, 80.0)] {
            store
                .commit_reading(&reading(d.id, pct, t0() + Duration::hours(h)), DeviceStatus::Online)
                .unwrap();
        }

        let pcts: Vec<f64> = store.list_readings(d.id, 10).unwrap().iter().map(|r| r.battery_pct).collect();
        assert_eq!(pcts, vec![70.0, 80.0, 90.0]);
        assert_eq!(store.list_readings(d.id, 1).unwrap()[0].reading_time, t0() + Duration::hours(2));
        assert!(store.list_readings(404, 10).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_created_at_reads_back_stable() {
        let (_tmp, store) = open();
        let d = store.create_device(&NewDevice::new("s", DeviceType::Sensor, "x"), t0()).unwrap();
        store
            .conn()
            .unwrap()
            .execute("UPDATE devices SET created_at = 'garbage' WHERE id = ?1", params![d.id])
            .unwrap();

        let first = store.get_device(d.id).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = store.get_device(d.id).unwrap();
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(first.created_at, DateTime::<Utc>::default());
        assert_eq!(first.last_seen, t0());
    }

    #[test]
    fn test_alerts_listing_and_resolution() {
        let (_tmp, store) = open();
        let d = store.create_device(&NewDevice::new("s", DeviceType::Sensor, "x"), t0()).unwrap();

        let first = store.insert_alert(&alert(d.id, AlertType::LowBattery, 25.0), t0()).unwrap();
        let second = store
            .insert_alert(&alert(d.id, AlertType::Critical, 10.0), t0() + Duration::minutes(1))
            .unwrap();
        assert!(!first.resolved);

        let listed: Vec<i64> = store.list_unresolved_alerts().unwrap().iter().map(|a| a.id).collect();
        assert_eq!(listed, vec![second.id, first.id]);
        assert_eq!(store.count_unresolved_alerts().unwrap(), 2);
        assert!(store.has_unresolved_alert(d.id, AlertType::LowBattery).unwrap());

        let resolved = store.resolve_alert(first.id).unwrap();
        assert!(resolved.resolved);
        assert_eq!(store.count_unresolved_alerts().unwrap(), 1);
        assert!(!store.has_unresolved_alert(d.id, AlertType::LowBattery).unwrap());
        assert!(matches!(store.resolve_alert(999), Err(DbError::NotFound)));
    }

    #[test]
    fn test_delete_device_removes_history() {
        let (_tmp, store) = open();
        let d = store.create_device(&NewDevice::new("s", DeviceType::Sensor, "x"), t0()).unwrap();
        store.commit_reading(&reading(d.id, 20.0, t0()), DeviceStatus::Warning).unwrap();
        store.insert_alert(&alert(d.id, AlertType::LowBattery, 20.0), t0()).unwrap();

        store.delete_device(d.id).unwrap();
        assert_eq!(store.count_readings(d.id).unwrap(), 0);
        assert_eq!(store.count_unresolved_alerts().unwrap(), 0);
    }

    #[test]
    fn test_snapshot() {
        let (_tmp, store) = open();
        let d = store.create_device(&NewDevice::new("s", DeviceType::Sensor, "x"), t0()).unwrap();
        store.insert_alert(&alert(d.id, AlertType::LowBattery, 20.0), t0()).unwrap();

        let snap = store.snapshot(false).unwrap();
        assert_eq!(snap.devices.len(), 1);
        assert_eq!(snap.active_alerts, 1);
        assert!(snap.unresolved_alerts.is_empty());

        let full = store.snapshot(true).unwrap();
        assert_eq!(full.active_alerts, 1);
        assert_eq!(full.unresolved_alerts[0].device_id, d.id);
    }

    #[test]
    fn test_parse_db_time_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_db_time(&format_db_time(expected)), Some(expected));
        assert_eq!(parse_db_time("2026-03-01 12:00:00"), Some(expected));
        assert_eq!(parse_db_time("2026-03-01T12:00:00.000000"), Some(expected));
        assert_eq!(parse_db_time("2026-03-01T12:00:00+00:00"), Some(expected));
        assert_eq!(parse_db_time("yesterday"), None);
    }
}
