use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::{
    cache::{device_key, TtlCache},
    db::{self, models::Device},
    error::TelemetryError,
};

/// Read-only lookup of devices: existence, owner, active flag.
///
/// Lookups go through the shared cache with a bounded TTL; any cache
/// anomaly (miss, expiry, undecodable value) falls through to PostgreSQL
/// and repopulates the entry. The cache is never user-visible.
#[derive(Clone)]
pub struct DeviceDirectory {
    pool: PgPool,
    cache: TtlCache,
    ttl: Duration,
}

impl DeviceDirectory {
    pub fn new(pool: PgPool, cache: TtlCache, ttl: Duration) -> Self {
        Self { pool, cache, ttl }
    }

    /// Resolves a device id to its directory row, or `DeviceNotFound`.
    pub async fn resolve(&self, device_id: Uuid) -> Result<Device, TelemetryError> {
        let key = device_key(device_id);

        if let Some(bytes) = self.cache.get(&key).await {
            match serde_json::from_slice::<Device>(&bytes) {
                Ok(device) => return Ok(device),
                Err(e) => {
                    // Undecodable cache value: treat as a miss.
                    debug!(device_id = %device_id, error = %e, "dropping undecodable device cache entry");
                    self.cache.invalidate(&key).await;
                }
            }
        }

        let device = db::read_with_retry(|| {
            sqlx::query_as::<_, Device>(
                "SELECT id, user_id, name, device_type, location, is_active \
                 FROM devices WHERE id = $1",
            )
            .bind(device_id)
            .fetch_optional(&self.pool)
        })
        .await?
        .ok_or(TelemetryError::DeviceNotFound(device_id))?;

        if let Ok(bytes) = serde_json::to_vec(&device) {
            self.cache.set(key, bytes, self.ttl).await;
        }

        Ok(device)
    }

    /// Resolves every id in `ids` (duplicates allowed), or fails with
    /// `DevicesNotFound` naming each missing id. Used by batch ingestion to
    /// reject a batch before anything is written.
    pub async fn resolve_many(
        &self,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Device>, TelemetryError> {
        let unique: Vec<Uuid> = ids
            .iter()
            .copied()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let devices = db::read_with_retry(|| {
            sqlx::query_as::<_, Device>(
                "SELECT id, user_id, name, device_type, location, is_active \
                 FROM devices WHERE id = ANY($1)",
            )
            .bind(&unique)
            .fetch_all(&self.pool)
        })
        .await?;

        let found: HashMap<Uuid, Device> =
            devices.into_iter().map(|d| (d.id, d)).collect();

        let mut missing: Vec<Uuid> = unique
            .into_iter()
            .filter(|id| !found.contains_key(id))
            .collect();
        if !missing.is_empty() {
            missing.sort();
            return Err(TelemetryError::DevicesNotFound(missing));
        }

        Ok(found)
    }

    /// All active devices owned by `user_id`, ordered by name then id so
    /// downstream rankings have a deterministic tie-break base. A user with
    /// no devices yields an empty list, not an error.
    pub async fn list_active(&self, user_id: Uuid) -> Result<Vec<Device>, TelemetryError> {
        let devices = db::read_with_retry(|| {
            sqlx::query_as::<_, Device>(
                "SELECT id, user_id, name, device_type, location, is_active \
                 FROM devices WHERE user_id = $1 AND is_active ORDER BY name, id",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
        })
        .await?;
        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory(pool: PgPool, cache: TtlCache) -> DeviceDirectory {
        DeviceDirectory::new(pool, cache, Duration::from_secs(300))
    }

    async fn insert_device(pool: &PgPool, user_id: Uuid, name: &str, active: bool) -> Uuid {
        sqlx::query_scalar(
            "INSERT INTO devices (user_id, name, device_type, is_active) \
             VALUES ($1, $2, 'meter', $3) RETURNING id",
        )
        .bind(user_id)
        .bind(name)
        .bind(active)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn resolve_unknown_device_is_not_found(pool: PgPool) {
        let dir = directory(pool, TtlCache::new());
        let id = Uuid::new_v4();
        let err = dir.resolve(id).await.unwrap_err();
        assert!(matches!(err, TelemetryError::DeviceNotFound(got) if got == id));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn resolve_populates_the_cache(pool: PgPool) {
        let cache = TtlCache::new();
        let dir = directory(pool.clone(), cache.clone());
        let id = insert_device(&pool, Uuid::new_v4(), "heater", true).await;

        let device = dir.resolve(id).await.unwrap();
        assert_eq!(device.name, "heater");
        assert!(cache.get(&device_key(id)).await.is_some());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn poisoned_cache_entry_falls_through_to_storage(pool: PgPool) {
        let cache = TtlCache::new();
        let dir = directory(pool.clone(), cache.clone());
        let id = insert_device(&pool, Uuid::new_v4(), "fridge", true).await;

        cache
            .set(device_key(id), b"not json at all".to_vec(), Duration::from_secs(300))
            .await;

        let device = dir.resolve(id).await.unwrap();
        assert_eq!(device.name, "fridge");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn resolve_many_reports_every_missing_id(pool: PgPool) {
        let dir = directory(pool.clone(), TtlCache::new());
        let known = insert_device(&pool, Uuid::new_v4(), "tv", true).await;
        let missing_a = Uuid::new_v4();
        let missing_b = Uuid::new_v4();

        let err = dir
            .resolve_many(&[known, missing_a, missing_b])
            .await
            .unwrap_err();
        match err {
            TelemetryError::DevicesNotFound(ids) => {
                assert_eq!(ids.len(), 2);
                assert!(ids.contains(&missing_a));
                assert!(ids.contains(&missing_b));
            }
            other => panic!("expected DevicesNotFound, got {other:?}"),
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn resolve_many_tolerates_duplicate_ids(pool: PgPool) {
        let dir = directory(pool.clone(), TtlCache::new());
        let id = insert_device(&pool, Uuid::new_v4(), "tv", true).await;

        let map = dir.resolve_many(&[id, id, id]).await.unwrap();
        assert_eq!(map.len(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn list_active_skips_inactive_and_other_users(pool: PgPool) {
        let dir = directory(pool.clone(), TtlCache::new());
        let user = Uuid::new_v4();
        insert_device(&pool, user, "b-washer", true).await;
        insert_device(&pool, user, "a-dryer", true).await;
        insert_device(&pool, user, "retired", false).await;
        insert_device(&pool, Uuid::new_v4(), "not-mine", true).await;

        let devices = dir.list_active(user).await.unwrap();
        let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a-dryer", "b-washer"]);
    }
}
