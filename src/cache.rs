use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{sync::RwLock, time::Instant};
use uuid::Uuid;

/// Process-local TTL cache of opaque byte values.
///
/// Wrapped in `Arc` so it can be cheaply cloned and shared across tasks.
/// Uses `tokio::sync::RwLock` so concurrent readers never block each other.
///
/// The cache is never authoritative: an expired entry behaves exactly like
/// a miss, and callers treat undecodable values as misses too, so every
/// anomaly falls through to the backing store.
#[derive(Clone, Default)]
pub struct TtlCache {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
}

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live value for `key`, or `None` on a miss or an expired
    /// entry. Expired entries are dropped on the way out.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        {
            let map = self.inner.read().await;
            match map.get(key) {
                Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
                Some(_) => {} // expired, fall through to remove
                None => return None,
            }
        }
        let mut map = self.inner.write().await;
        if map.get(key).is_some_and(|e| e.expires_at <= now) {
            map.remove(key);
        }
        None
    }

    pub async fn set(&self, key: String, value: Vec<u8>, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.inner.write().await.insert(key, entry);
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.write().await.remove(key);
    }

    pub async fn invalidate_many(&self, keys: &[String]) {
        let mut map = self.inner.write().await;
        for key in keys {
            map.remove(key);
        }
    }

    /// Drops every entry whose key starts with `prefix`. Summary keys embed
    /// the window width, so write paths clear all of a device's summaries
    /// this way instead of enumerating every window ever queried.
    pub async fn invalidate_prefix(&self, prefix: &str) {
        self.inner
            .write()
            .await
            .retain(|key, _| !key.starts_with(prefix));
    }
}

// ---------------------------------------------------------------------------
// Key scheme
// ---------------------------------------------------------------------------

pub fn device_key(device_id: Uuid) -> String {
    format!("device:{device_id}")
}

pub fn summary_key(device_id: Uuid, hours: i64) -> String {
    format!("summary:{device_id}:{hours}")
}

pub fn summary_prefix(device_id: Uuid) -> String {
    format!("summary:{device_id}:")
}
