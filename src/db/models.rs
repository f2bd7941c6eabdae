//! Database model types.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Returned when a stored or requested enum value is not recognised.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Implements text conversions (display, parsing, SQLite columns) for a
/// fieldless enum from a variant/string table.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: UnknownVariant| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Sensor,
    Gateway,
    Actuator,
    Camera,
    Tracker,
}

text_enum!(DeviceType, "device type", {
    Sensor => "sensor",
    Gateway => "gateway",
    Actuator => "actuator",
    Camera => "camera",
    Tracker => "tracker",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BatteryType {
    #[default]
    LiPo,
    LiIon,
    #[serde(rename = "AA")]
    Aa,
    #[serde(rename = "AAA")]
    Aaa,
    NiMH,
    LiFePO4,
}

text_enum!(BatteryType, "battery type", {
    LiPo => "LiPo",
    LiIon => "LiIon",
    Aa => "AA",
    Aaa => "AAA",
    NiMH => "NiMH",
    LiFePO4 => "LiFePO4",
});

/// Device status. Everything except `Offline` is derived from the battery level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    #[default]
    Online,
    Offline,
    Warning,
    Critical,
}

text_enum!(DeviceStatus, "device status", {
    Online => "online",
    Offline => "offline",
    Warning => "warning",
    Critical => "critical",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowBattery,
    Critical,
    /// Reserved, never raised by the alert policy.
    Offline,
    /// Reserved, never raised by the alert policy.
    TempHigh,
}

text_enum!(AlertType, "alert type", {
    LowBattery => "low_battery",
    Critical => "critical",
    Offline => "offline",
    TempHigh => "temp_high",
});

/// Health bucket computed from the raw battery level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Healthy,
    Warning,
    Low,
    Critical,
}

impl Health {
    pub fn from_pct(pct: f64) -> Self {
        if pct >= 60.0 {
            Health::Healthy
        } else if pct >= 30.0 {
            Health::Warning
        } else if pct >= 15.0 {
            Health::Low
        } else {
            Health::Critical
        }
    }
}

/// A monitored IoT device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub name: String,
    pub device_type: DeviceType,
    pub location: String,
    pub battery_type: BatteryType,
    pub battery_capacity_mah: i64,
    pub current_pct: f64,
    pub last_seen: DateTime<Utc>,
    pub status: DeviceStatus,
    pub firmware_version: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl Device {
    pub fn health(&self) -> Health {
        Health::from_pct(self.current_pct)
    }

    /// Days until empty at the given daily drain, `None` if the device is not draining.
    pub fn days_remaining(&self, daily_drain_pct: f64) -> Option<f64> {
        if daily_drain_pct <= 0.0 {
            return None;
        }
        Some((self.current_pct / daily_drain_pct * 10.0).round() / 10.0)
    }
}

fn default_location() -> String {
    "unknown".to_string()
}

fn default_capacity() -> i64 {
    2000
}

fn default_firmware() -> String {
    "1.0.0".to_string()
}

/// Registration fields for a new device.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDevice {
    pub name: String,
    pub device_type: DeviceType,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default)]
    pub battery_type: BatteryType,
    #[serde(default = "default_capacity")]
    pub battery_capacity_mah: i64,
    #[serde(default = "default_firmware", alias = "firmware")]
    pub firmware_version: String,
    #[serde(default)]
    pub notes: String,
}

impl NewDevice {
    #[cfg(test)]
    pub fn new(name: &str, device_type: DeviceType, location: &str) -> Self {
        Self {
            name: name.to_string(),
            device_type,
            location: location.to_string(),
            battery_type: BatteryType::default(),
            battery_capacity_mah: default_capacity(),
            firmware_version: default_firmware(),
            notes: String::new(),
        }
    }
}

/// A single battery telemetry reading.
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    pub id: i64,
    pub device_id: i64,
    pub reading_time: DateTime<Utc>,
    pub battery_pct: f64,
    pub voltage_mv: Option<f64>,
    pub temperature_c: Option<f64>,
    pub signal_rssi: Option<i64>,
    /// Percent per hour, positive while discharging.
    pub drain_rate: Option<f64>,
}

/// A reading ready to be written, drain rate already computed.
#[derive(Debug, Clone)]
pub struct NewReading {
    pub device_id: i64,
    pub reading_time: DateTime<Utc>,
    pub battery_pct: f64,
    pub voltage_mv: Option<f64>,
    pub temperature_c: Option<f64>,
    pub signal_rssi: Option<i64>,
    pub drain_rate: Option<f64>,
}

/// The latest stored reading for a device, as needed for drain computation.
///
/// `reading_time` is `None` when the stored timestamp cannot be parsed.
#[derive(Debug, Clone)]
pub struct PriorReading {
    pub battery_pct: f64,
    pub reading_time: Option<DateTime<Utc>>,
    pub drain_rate: Option<f64>,
}

/// A battery alert.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: i64,
    pub device_id: i64,
    pub alert_type: AlertType,
    pub threshold: f64,
    pub current_value: f64,
    pub message: String,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

/// An alert raised by the policy, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub device_id: i64,
    pub alert_type: AlertType,
    pub threshold: f64,
    pub current_value: f64,
    pub message: String,
}

/// Devices and unresolved alerts read in one transaction.
#[derive(Debug, Clone, Default)]
pub struct FleetSnapshot {
    pub devices: Vec<Device>,
    pub active_alerts: i64,
    /// Empty unless the snapshot was taken with alerts.
    pub unresolved_alerts: Vec<Alert>,
}
