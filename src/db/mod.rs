pub mod models;

use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::warn;

/// Bounded acquire timeout so a stalled database surfaces as an
/// `Unavailable` error instead of hanging the request task.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Read retries
// ---------------------------------------------------------------------------

const READ_RETRIES: u32 = 2;
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Runs an idempotent read, retrying transient storage failures a bounded
/// number of times with linear backoff. Write paths must NOT go through
/// this: a retried write could ingest the same reading twice.
pub(crate) async fn read_with_retry<T, F, Fut>(op: F) -> Result<T, sqlx::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < READ_RETRIES && is_transient(&e) => {
                attempt += 1;
                warn!(error = %e, attempt, "transient storage error on read path; retrying");
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_transient(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn read_with_retry_returns_first_success() {
        let calls = AtomicU32::new(0);
        let out = read_with_retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, sqlx::Error>(7)
        })
        .await
        .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn read_with_retry_retries_transient_then_gives_up() {
        let calls = AtomicU32::new(0);
        let err = read_with_retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<u32, _>(sqlx::Error::PoolTimedOut)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, sqlx::Error::PoolTimedOut));
        // initial attempt + READ_RETRIES retries
        assert_eq!(calls.load(Ordering::SeqCst), 1 + READ_RETRIES);
    }

    #[tokio::test]
    async fn read_with_retry_does_not_retry_deterministic_errors() {
        let calls = AtomicU32::new(0);
        let err = read_with_retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<u32, _>(sqlx::Error::RowNotFound)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, sqlx::Error::RowNotFound));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
