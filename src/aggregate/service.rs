use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    cache::{summary_key, TtlCache},
    config::TotalEnergyMode,
    db::{self, models::Device},
    directory::DeviceDirectory,
    error::TelemetryError,
};

use super::summary::{
    self, DeviceSummary, HourlyBucket, UserSummary,
};

/// Read-path computation over the reading store and device directory.
///
/// Owns no persistent state: summaries are recomputed on demand and
/// memoized briefly in the shared cache. Writes elsewhere invalidate those
/// entries synchronously, so a cached summary is never stale relative to
/// an acknowledged write.
#[derive(Clone)]
pub struct AggregationService {
    pool: PgPool,
    directory: DeviceDirectory,
    cache: TtlCache,
    summary_ttl: StdDuration,
    total_mode: TotalEnergyMode,
}

impl AggregationService {
    pub fn new(
        pool: PgPool,
        directory: DeviceDirectory,
        cache: TtlCache,
        summary_ttl: StdDuration,
        total_mode: TotalEnergyMode,
    ) -> Self {
        Self { pool, directory, cache, summary_ttl, total_mode }
    }

    /// Summary for one device over the trailing window. Unknown devices
    /// fail with `DeviceNotFound`; a device with no readings in the window
    /// yields an all-zero summary.
    pub async fn device_summary(
        &self,
        device_id: Uuid,
        hours: i64,
    ) -> Result<DeviceSummary, TelemetryError> {
        let device = self.directory.resolve(device_id).await?;
        self.summary_for_device(&device, hours).await
    }

    /// Per-device summaries for a user's active devices, in directory
    /// order. With `top = Some(n)`, ranked by total descending (stable on
    /// ties) and truncated to `n`.
    pub async fn user_devices(
        &self,
        user_id: Uuid,
        hours: i64,
        top: Option<usize>,
    ) -> Result<Vec<DeviceSummary>, TelemetryError> {
        let devices = self.directory.list_active(user_id).await?;
        let mut summaries = Vec::with_capacity(devices.len());
        for device in &devices {
            summaries.push(self.summary_for_device(device, hours).await?);
        }
        if let Some(top) = top {
            summary::rank_top(&mut summaries, top);
        }
        Ok(summaries)
    }

    /// Combined rollup for a user. Zero active devices yields an all-zero
    /// summary with an empty device list, not an error.
    pub async fn user_summary(
        &self,
        user_id: Uuid,
        hours: i64,
    ) -> Result<UserSummary, TelemetryError> {
        let devices = self.user_devices(user_id, hours, None).await?;
        Ok(UserSummary::from_devices(user_id, devices))
    }

    /// Hour-truncated buckets for one device, ascending by slot start.
    /// Hours with no samples are omitted, not zero-filled.
    pub async fn hourly_buckets(
        &self,
        device_id: Uuid,
        hours: i64,
    ) -> Result<Vec<HourlyBucket>, TelemetryError> {
        self.directory.resolve(device_id).await?;

        let cutoff = Utc::now() - Duration::hours(hours);
        let rows = db::read_with_retry(|| {
            sqlx::query_as::<_, (DateTime<Utc>, f64, f64, i64)>(
                "SELECT date_trunc('hour', recorded_at) AS hour, \
                        AVG(watts), MAX(watts), COUNT(*) \
                 FROM telemetry \
                 WHERE device_id = $1 AND recorded_at >= $2 \
                 GROUP BY 1 \
                 ORDER BY 1",
            )
            .bind(device_id)
            .bind(cutoff)
            .fetch_all(&self.pool)
        })
        .await?;

        Ok(rows
            .into_iter()
            .map(|(hour, average_power, peak_power, data_points)| HourlyBucket {
                hour,
                average_power,
                peak_power,
                data_points,
            })
            .collect())
    }

    async fn summary_for_device(
        &self,
        device: &Device,
        hours: i64,
    ) -> Result<DeviceSummary, TelemetryError> {
        let key = summary_key(device.id, hours);
        if let Some(bytes) = self.cache.get(&key).await {
            if let Ok(cached) = serde_json::from_slice::<DeviceSummary>(&bytes) {
                return Ok(cached);
            }
            self.cache.invalidate(&key).await;
        }

        let cutoff = Utc::now() - Duration::hours(hours);
        let (watt_sum, average_power, peak_power, data_points, last_reading) =
            db::read_with_retry(|| {
                sqlx::query_as::<_, (f64, f64, f64, i64, Option<DateTime<Utc>>)>(
                    "SELECT COALESCE(SUM(watts), 0), \
                            COALESCE(AVG(watts), 0), \
                            COALESCE(MAX(watts), 0), \
                            COUNT(*), \
                            MAX(recorded_at) \
                     FROM telemetry \
                     WHERE device_id = $1 AND recorded_at >= $2",
                )
                .bind(device.id)
                .bind(cutoff)
                .fetch_one(&self.pool)
            })
            .await?;

        let total_energy = match self.total_mode {
            TotalEnergyMode::WattSum => watt_sum,
            TotalEnergyMode::WattHours if data_points > 1 => {
                self.integral_for_window(device.id, cutoff).await?
            }
            TotalEnergyMode::WattHours => 0.0,
        };

        let computed = DeviceSummary {
            device_id: device.id,
            device_name: device.name.clone(),
            total_energy,
            average_power,
            peak_power,
            data_points,
            last_reading,
        };

        if let Ok(bytes) = serde_json::to_vec(&computed) {
            self.cache.set(key, bytes, self.summary_ttl).await;
        }
        Ok(computed)
    }

    async fn integral_for_window(
        &self,
        device_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<f64, TelemetryError> {
        let samples = db::read_with_retry(|| {
            sqlx::query_as::<_, (DateTime<Utc>, f64)>(
                "SELECT recorded_at, watts \
                 FROM telemetry \
                 WHERE device_id = $1 AND recorded_at >= $2 \
                 ORDER BY recorded_at ASC, id ASC",
            )
            .bind(device_id)
            .bind(cutoff)
            .fetch_all(&self.pool)
        })
        .await?;
        Ok(summary::integrate_watt_hours(&samples))
    }
}
