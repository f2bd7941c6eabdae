//! Threshold alert policy.

use crate::config::Thresholds;
use crate::db::{AlertType, NewAlert};

/// Decides which alert, if any, a battery level raises.
///
/// Stateless: the same level always produces the same alert. `Offline` and
/// `TempHigh` alerts are never produced here.
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    thresholds: Thresholds,
}

impl AlertPolicy {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn evaluate(&self, device_id: i64, battery_pct: f64) -> Option<NewAlert> {
        let Thresholds {
            critical_pct,
            low_pct,
        } = self.thresholds;

        if battery_pct <= critical_pct {
            Some(NewAlert {
                device_id,
                alert_type: AlertType::Critical,
                threshold: critical_pct,
                current_value: battery_pct,
                message: format!("CRITICAL: battery at {:.1}%!", battery_pct),
            })
        } else if battery_pct <= low_pct {
            Some(NewAlert {
                device_id,
                alert_type: AlertType::LowBattery,
                threshold: low_pct,
                current_value: battery_pct,
                message: format!("Battery low: {:.1}%", battery_pct),
            })
        } else {
            None
        }
    }
}
