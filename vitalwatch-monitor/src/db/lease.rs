//! Durable worker lease
//!
//! A drain pass first claims a lease row keyed by lease name. The claim
//! succeeds when no row exists, the existing lease has expired, or the
//! caller already owns it. This keeps horizontally scaled deployments from
//! double-processing the same jobs; the in-process single-flight guard alone
//! only covers one instance.

use sqlx::SqlitePool;
use std::time::Duration;
use uuid::Uuid;
use vitalwatch_common::time::{now, now_db_timestamp, to_db_timestamp};
use vitalwatch_common::Result;

/// Lease name used by the retry queue drain
pub const DRAIN_LEASE: &str = "retry-queue-drain";

/// Try to claim the named lease for `ttl`. Returns whether the claim
/// succeeded. The TTL covers crash recovery: a lease that is never released
/// becomes stealable once it expires.
pub async fn try_acquire(
    pool: &SqlitePool,
    name: &str,
    owner: Uuid,
    ttl: Duration,
) -> Result<bool> {
    let expires_at = to_db_timestamp(
        now() + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(60)),
    );

    let claimed = sqlx::query(
        r#"
        INSERT INTO worker_lease (name, owner, expires_at)
        VALUES (?, ?, ?)
        ON CONFLICT(name) DO UPDATE SET
            owner = excluded.owner,
            expires_at = excluded.expires_at
        WHERE worker_lease.expires_at <= ? OR worker_lease.owner = excluded.owner
        "#,
    )
    .bind(name)
    .bind(owner.to_string())
    .bind(expires_at)
    .bind(now_db_timestamp())
    .execute(pool)
    .await?;

    Ok(claimed.rows_affected() > 0)
}

/// Release the named lease if still held by `owner`
pub async fn release(pool: &SqlitePool, name: &str, owner: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM worker_lease WHERE name = ? AND owner = ?")
        .bind(name)
        .bind(owner.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_acquire_then_contend() {
        let pool = test_pool().await;
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let ttl = Duration::from_secs(60);

        assert!(try_acquire(&pool, DRAIN_LEASE, first, ttl).await.unwrap());
        // Another owner cannot steal a live lease
        assert!(!try_acquire(&pool, DRAIN_LEASE, second, ttl).await.unwrap());
        // The holder can refresh its own lease
        assert!(try_acquire(&pool, DRAIN_LEASE, first, ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_frees_lease() {
        let pool = test_pool().await;
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let ttl = Duration::from_secs(60);

        assert!(try_acquire(&pool, DRAIN_LEASE, first, ttl).await.unwrap());
        release(&pool, DRAIN_LEASE, first).await.unwrap();
        assert!(try_acquire(&pool, DRAIN_LEASE, second, ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_by_non_owner_is_a_no_op() {
        let pool = test_pool().await;
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let ttl = Duration::from_secs(60);

        assert!(try_acquire(&pool, DRAIN_LEASE, first, ttl).await.unwrap());
        release(&pool, DRAIN_LEASE, second).await.unwrap();
        // Still held by the first owner
        assert!(!try_acquire(&pool, DRAIN_LEASE, second, ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_lease_is_stealable() {
        let pool = test_pool().await;
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        // Zero TTL expires immediately
        assert!(try_acquire(&pool, DRAIN_LEASE, first, Duration::ZERO).await.unwrap());
        assert!(try_acquire(&pool, DRAIN_LEASE, second, Duration::from_secs(60))
            .await
            .unwrap());
    }
}
