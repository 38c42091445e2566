use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered device. Rows are owned by the device directory and are
/// never physically deleted while telemetry references them; retirement is
/// the `is_active` flag only, so historical readings always keep a valid
/// owner for user-level rollups.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Device {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// Free-form category, display only.
    pub device_type: String,
    pub location: Option<String>,
    pub is_active: bool,
}

/// One stored power sample. Immutable once written.
///
/// `recorded_at` is the caller-supplied measurement instant; out-of-order
/// and duplicate timestamps are valid. `id` is a BIGSERIAL and breaks ties
/// between readings sharing a timestamp, keeping ordered reads
/// deterministic.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,
    pub device_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub watts: f64,
    pub created_at: DateTime<Utc>,
}
