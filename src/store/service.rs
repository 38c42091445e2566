use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::{
    cache::{device_key, summary_prefix, TtlCache},
    db::{self, models::Reading},
    error::TelemetryError,
};

/// One reading as submitted by a producer, before it is stored.
#[derive(Debug, Clone, Copy)]
pub struct NewReading {
    pub device_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub watts: f64,
}

/// Append-only store of telemetry rows.
///
/// Device existence is validated by the caller (the ingestion endpoint)
/// before anything reaches this store. Every write invalidates the affected
/// device's cached metadata and summaries after commit, before the call
/// returns, so a read issued after a successful write never sees a
/// pre-write summary.
#[derive(Clone)]
pub struct ReadingStore {
    pool: PgPool,
    cache: TtlCache,
    max_batch_size: usize,
}

impl ReadingStore {
    pub fn new(pool: PgPool, cache: TtlCache, max_batch_size: usize) -> Self {
        Self { pool, cache, max_batch_size }
    }

    /// Rejects batches above the configured maximum. Public so the
    /// ingestion endpoint can fail fast before resolving device ids.
    pub fn ensure_batch_size(&self, size: usize) -> Result<(), TelemetryError> {
        if size > self.max_batch_size {
            return Err(TelemetryError::BatchTooLarge {
                size,
                max: self.max_batch_size,
            });
        }
        Ok(())
    }

    /// Stores one reading. Negative watts are rejected with `InvalidValue`;
    /// out-of-order and duplicate timestamps are accepted as-is.
    pub async fn append(&self, reading: NewReading) -> Result<Reading, TelemetryError> {
        validate_watts(&reading)?;

        let stored = sqlx::query_as::<_, Reading>(
            "INSERT INTO telemetry (device_id, recorded_at, watts) \
             VALUES ($1, $2, $3) \
             RETURNING id, device_id, recorded_at, watts, created_at",
        )
        .bind(reading.device_id)
        .bind(reading.recorded_at)
        .bind(reading.watts)
        .fetch_one(&self.pool)
        .await?;

        self.invalidate_device(reading.device_id).await;
        Ok(stored)
    }

    /// Stores a batch of readings in a single transaction: either every
    /// reading is durably committed or none are.
    pub async fn append_batch(
        &self,
        readings: &[NewReading],
    ) -> Result<Vec<Reading>, TelemetryError> {
        self.ensure_batch_size(readings.len())?;
        for reading in readings {
            validate_watts(reading)?;
        }

        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(readings.len());
        for reading in readings {
            let row = sqlx::query_as::<_, Reading>(
                "INSERT INTO telemetry (device_id, recorded_at, watts) \
                 VALUES ($1, $2, $3) \
                 RETURNING id, device_id, recorded_at, watts, created_at",
            )
            .bind(reading.device_id)
            .bind(reading.recorded_at)
            .bind(reading.watts)
            .fetch_one(&mut *tx)
            .await?;
            stored.push(row);
        }
        tx.commit().await?;

        let devices: HashSet<Uuid> = readings.iter().map(|r| r.device_id).collect();
        for device_id in devices {
            self.invalidate_device(device_id).await;
        }

        info!(count = stored.len(), "telemetry batch committed");
        Ok(stored)
    }

    /// Readings for a device within the trailing window, newest first.
    /// Equal timestamps fall back to insertion order (newest insert first).
    pub async fn query(
        &self,
        device_id: Uuid,
        hours: i64,
        limit: i64,
    ) -> Result<Vec<Reading>, TelemetryError> {
        let cutoff = Utc::now() - Duration::hours(hours);
        let rows = db::read_with_retry(|| {
            sqlx::query_as::<_, Reading>(
                "SELECT id, device_id, recorded_at, watts, created_at \
                 FROM telemetry \
                 WHERE device_id = $1 AND recorded_at >= $2 \
                 ORDER BY recorded_at DESC, id DESC \
                 LIMIT $3",
            )
            .bind(device_id)
            .bind(cutoff)
            .bind(limit)
            .fetch_all(&self.pool)
        })
        .await?;
        Ok(rows)
    }

    /// Deletes every reading for `device_id` with `recorded_at` at or after
    /// the trailing cutover. Returns the number of rows removed.
    /// Irreversible; readings strictly before the cutover are untouched.
    pub async fn delete_window(
        &self,
        device_id: Uuid,
        hours: i64,
    ) -> Result<u64, TelemetryError> {
        let cutoff = Utc::now() - Duration::hours(hours);
        let result = sqlx::query(
            "DELETE FROM telemetry WHERE device_id = $1 AND recorded_at >= $2",
        )
        .bind(device_id)
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        self.invalidate_device(device_id).await;

        let deleted = result.rows_affected();
        info!(device_id = %device_id, deleted, "telemetry window deleted");
        Ok(deleted)
    }

    async fn invalidate_device(&self, device_id: Uuid) {
        self.cache.invalidate(&device_key(device_id)).await;
        self.cache.invalidate_prefix(&summary_prefix(device_id)).await;
    }
}

fn validate_watts(reading: &NewReading) -> Result<(), TelemetryError> {
    if reading.watts < 0.0 || !reading.watts.is_finite() {
        return Err(TelemetryError::InvalidValue(format!(
            "watts must be a non-negative number, got {} for device {}",
            reading.watts, reading.device_id
        )));
    }
    Ok(())
}
