use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    aggregate::summary::{round2, DeviceSummary, HourlyBucket, UserSummary},
    db::models::Reading,
};

// All figures round to two decimals here, at the presentation boundary,
// and nowhere earlier.

/// One telemetry sample to ingest.
#[derive(Debug, Deserialize, ToSchema)]
pub struct IngestReading {
    pub device_id: Uuid,
    /// Measurement instant (RFC3339, UTC). Caller-supplied; out-of-order
    /// and duplicate timestamps are accepted.
    pub timestamp: DateTime<Utc>,
    /// Instantaneous power draw in watts. Non-negative.
    pub energy_watts: f64,
}

/// Request body for `POST /batch`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct IngestBatch {
    pub data: Vec<IngestReading>,
}

/// A stored reading.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadingDto {
    pub id: i64,
    pub device_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub energy_watts: f64,
    pub created_at: DateTime<Utc>,
}

impl From<Reading> for ReadingDto {
    fn from(r: Reading) -> Self {
        Self {
            id: r.id,
            device_id: r.device_id,
            timestamp: r.recorded_at,
            energy_watts: round2(r.watts),
            created_at: r.created_at,
        }
    }
}

/// Device energy consumption summary over a trailing window.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeviceSummaryDto {
    pub device_id: Uuid,
    pub device_name: String,
    pub total_energy: f64,
    pub average_power: f64,
    pub peak_power: f64,
    pub data_points: i64,
    pub last_reading: Option<DateTime<Utc>>,
}

impl From<DeviceSummary> for DeviceSummaryDto {
    fn from(s: DeviceSummary) -> Self {
        Self {
            device_id: s.device_id,
            device_name: s.device_name,
            total_energy: round2(s.total_energy),
            average_power: round2(s.average_power),
            peak_power: round2(s.peak_power),
            data_points: s.data_points,
            last_reading: s.last_reading,
        }
    }
}

/// Combined summary across all of a user's active devices.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserSummaryDto {
    pub user_id: Uuid,
    pub total_energy: f64,
    pub average_power: f64,
    pub peak_power: f64,
    pub device_count: usize,
    pub data_points: i64,
    pub devices: Vec<DeviceSummaryDto>,
}

impl From<UserSummary> for UserSummaryDto {
    fn from(s: UserSummary) -> Self {
        Self {
            user_id: s.user_id,
            total_energy: round2(s.total_energy),
            average_power: round2(s.average_power),
            peak_power: round2(s.peak_power),
            device_count: s.device_count,
            data_points: s.data_points,
            devices: s.devices.into_iter().map(Into::into).collect(),
        }
    }
}

/// One hour-aligned consumption slot.
#[derive(Debug, Serialize, ToSchema)]
pub struct HourlyBucketDto {
    /// Start of the hour slot (UTC).
    pub hour: DateTime<Utc>,
    pub average_power: f64,
    pub peak_power: f64,
    pub data_points: i64,
}

impl From<HourlyBucket> for HourlyBucketDto {
    fn from(b: HourlyBucket) -> Self {
        Self {
            hour: b.hour,
            average_power: round2(b.average_power),
            peak_power: round2(b.peak_power),
            data_points: b.data_points,
        }
    }
}

/// Receipt for a bulk delete.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteReceipt {
    pub deleted: u64,
}
