//! Pure aggregation math: per-device summaries, user-level rollups,
//! hourly buckets. No storage access and no rounding — figures stay at
//! full precision until the presentation boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate over one device's readings within a trailing window.
///
/// `total_energy` follows the configured [`TotalEnergyMode`]; all other
/// fields are mode-independent. Zero samples is a valid state: every
/// numeric field is zero and `last_reading` is `None`.
///
/// [`TotalEnergyMode`]: crate::config::TotalEnergyMode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub device_id: Uuid,
    pub device_name: String,
    pub total_energy: f64,
    pub average_power: f64,
    pub peak_power: f64,
    pub data_points: i64,
    pub last_reading: Option<DateTime<Utc>>,
}

/// Rollup of one user's active devices over the same trailing window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub user_id: Uuid,
    pub total_energy: f64,
    pub average_power: f64,
    pub peak_power: f64,
    pub device_count: usize,
    pub data_points: i64,
    pub devices: Vec<DeviceSummary>,
}

impl UserSummary {
    /// Combines per-device summaries. The average is the sample-weighted
    /// mean of device averages: a device reporting ten times a minute must
    /// dominate one reporting hourly, so Σ(avg·count)/Σcount, never the
    /// unweighted mean.
    pub fn from_devices(user_id: Uuid, devices: Vec<DeviceSummary>) -> Self {
        let total_energy = devices.iter().map(|d| d.total_energy).sum();
        let data_points: i64 = devices.iter().map(|d| d.data_points).sum();
        let average_power = if data_points > 0 {
            devices
                .iter()
                .map(|d| d.average_power * d.data_points as f64)
                .sum::<f64>()
                / data_points as f64
        } else {
            0.0
        };
        let peak_power = devices.iter().map(|d| d.peak_power).fold(0.0, f64::max);

        Self {
            user_id,
            total_energy,
            average_power,
            peak_power,
            device_count: devices.len(),
            data_points,
            devices,
        }
    }
}

/// One hour-aligned aggregation slot. Only slots containing at least one
/// sample exist; callers needing a dense series fill gaps themselves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyBucket {
    pub hour: DateTime<Utc>,
    pub average_power: f64,
    pub peak_power: f64,
    pub data_points: i64,
}

/// Sorts by total energy descending and truncates to `top`. `sort_by` is
/// stable, so ties keep the caller's ordering (directory listing order).
pub fn rank_top(devices: &mut Vec<DeviceSummary>, top: usize) {
    devices.sort_by(|a, b| {
        b.total_energy
            .partial_cmp(&a.total_energy)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    devices.truncate(top);
}

/// Trapezoidal integral of power over time, in watt-hours, across
/// consecutive samples. `samples` must be ascending by timestamp. Fewer
/// than two samples span no time and integrate to zero.
pub fn integrate_watt_hours(samples: &[(DateTime<Utc>, f64)]) -> f64 {
    samples
        .windows(2)
        .map(|pair| {
            let dt_hours =
                (pair[1].0 - pair[0].0).num_milliseconds() as f64 / 3_600_000.0;
            (pair[0].1 + pair[1].1) / 2.0 * dt_hours
        })
        .sum()
}

/// Rounds to two decimals. Applied only at the presentation boundary so
/// rounding error never compounds through per-device combination.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
