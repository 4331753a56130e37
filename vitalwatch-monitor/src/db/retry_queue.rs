//! Analysis retry queue database operations
//!
//! Owns the retry job rows and the exponential backoff policy. Enqueue is an
//! atomic upsert against a partial unique index on `reading_id`, so two
//! near-simultaneous failures for the same reading can never race into two
//! active jobs.

use sqlx::{Row, SqlitePool};
use std::time::Duration;
use uuid::Uuid;
use vitalwatch_common::time::{now, now_db_timestamp, parse_db_timestamp, to_db_timestamp};
use vitalwatch_common::{Error, Result};

use crate::models::{RetryJob, RetryQueueStats, RetryStatus};

/// Attempt ceiling for new jobs
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Base backoff delay
pub const BASE_DELAY_SECS: u64 = 15;

/// Backoff ceiling (24 hours)
pub const MAX_DELAY_SECS: u64 = 24 * 60 * 60;

/// Exponential backoff: 15s, 1m, 4m, 16m, ... capped at 24h
pub fn retry_delay(attempts: u32) -> Duration {
    let secs = BASE_DELAY_SECS.saturating_mul(4u64.saturating_pow(attempts));
    Duration::from_secs(secs.min(MAX_DELAY_SECS))
}

fn next_retry_timestamp(attempts: u32) -> String {
    let delay = chrono::Duration::from_std(retry_delay(attempts))
        .unwrap_or_else(|_| chrono::Duration::seconds(MAX_DELAY_SECS as i64));
    to_db_timestamp(now() + delay)
}

/// Add a failed analysis to the retry queue.
///
/// Upsert semantics: if an active job (pending/processing) already exists for
/// the reading, its `last_error` is refreshed and `next_retry_at` reset to
/// the base delay, treating the new failure as new information. `attempts`
/// is preserved. Otherwise a fresh job starts at zero attempts.
pub async fn enqueue(
    pool: &SqlitePool,
    reading_id: Uuid,
    player_id: Uuid,
    error: &str,
) -> Result<i64> {
    let now_ts = now_db_timestamp();

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO analysis_retry_queue (
            reading_id, player_id, attempts, max_attempts,
            last_error, status, next_retry_at, created_at, updated_at
        ) VALUES (?, ?, 0, ?, ?, 'pending', ?, ?, ?)
        ON CONFLICT(reading_id) WHERE status IN ('pending', 'processing') DO UPDATE SET
            last_error = excluded.last_error,
            status = 'pending',
            next_retry_at = excluded.next_retry_at,
            updated_at = excluded.updated_at
        RETURNING id
        "#,
    )
    .bind(reading_id.to_string())
    .bind(player_id.to_string())
    .bind(DEFAULT_MAX_ATTEMPTS as i64)
    .bind(error)
    .bind(next_retry_timestamp(0))
    .bind(&now_ts)
    .bind(&now_ts)
    .fetch_one(pool)
    .await?;

    tracing::debug!(job_id = id, reading_id = %reading_id, "Queued analysis retry");

    Ok(id)
}

/// Jobs that are pending and due, oldest due first, capped at `limit`
pub async fn select_due(pool: &SqlitePool, limit: u32) -> Result<Vec<RetryJob>> {
    let rows = sqlx::query(
        r#"
        SELECT id, reading_id, player_id, attempts, max_attempts,
               last_error, status, next_retry_at, created_at, updated_at
        FROM analysis_retry_queue
        WHERE status = 'pending' AND next_retry_at <= ?
        ORDER BY next_retry_at ASC
        LIMIT ?
        "#,
    )
    .bind(now_db_timestamp())
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(job_from_row).collect()
}

/// Fetch one job by id
pub async fn get_job(pool: &SqlitePool, job_id: i64) -> Result<Option<RetryJob>> {
    let row = sqlx::query(
        r#"
        SELECT id, reading_id, player_id, attempts, max_attempts,
               last_error, status, next_retry_at, created_at, updated_at
        FROM analysis_retry_queue
        WHERE id = ?
        "#,
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    row.map(job_from_row).transpose()
}

/// pending -> processing
pub async fn mark_processing(pool: &SqlitePool, job_id: i64) -> Result<()> {
    set_status(pool, job_id, RetryStatus::Processing).await
}

/// processing -> completed (terminal; the reading now carries an analysis)
pub async fn mark_completed(pool: &SqlitePool, job_id: i64) -> Result<()> {
    set_status(pool, job_id, RetryStatus::Completed).await
}

async fn set_status(pool: &SqlitePool, job_id: i64, status: RetryStatus) -> Result<()> {
    sqlx::query("UPDATE analysis_retry_queue SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(now_db_timestamp())
        .bind(job_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Record a failed attempt: reschedule with grown backoff while below the
/// attempt ceiling, otherwise transition to terminal `failed`.
///
/// Returns the resulting status.
pub async fn record_failure(pool: &SqlitePool, job: &RetryJob, error: &str) -> Result<RetryStatus> {
    let new_attempts = job.attempts + 1;

    if new_attempts >= job.max_attempts {
        sqlx::query(
            r#"
            UPDATE analysis_retry_queue
            SET attempts = ?, last_error = ?, status = 'failed', updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(new_attempts as i64)
        .bind(error)
        .bind(now_db_timestamp())
        .bind(job.id)
        .execute(pool)
        .await?;

        tracing::warn!(
            job_id = job.id,
            reading_id = %job.reading_id,
            attempts = new_attempts,
            "Analysis retry attempts exhausted, job failed"
        );

        Ok(RetryStatus::Failed)
    } else {
        sqlx::query(
            r#"
            UPDATE analysis_retry_queue
            SET attempts = ?, last_error = ?, status = 'pending', next_retry_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(new_attempts as i64)
        .bind(error)
        .bind(next_retry_timestamp(new_attempts))
        .bind(now_db_timestamp())
        .bind(job.id)
        .execute(pool)
        .await?;

        Ok(RetryStatus::Pending)
    }
}

/// Operator recovery: any status (including failed or completed) back to
/// pending with zero attempts and the base delay.
pub async fn reset(pool: &SqlitePool, job_id: i64) -> Result<()> {
    let updated = sqlx::query(
        r#"
        UPDATE analysis_retry_queue
        SET attempts = 0, status = 'pending', next_retry_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(next_retry_timestamp(0))
    .bind(now_db_timestamp())
    .bind(job_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Retry job not found: {}", job_id)));
    }

    Ok(())
}

/// Administrative purge of a single job
pub async fn delete(pool: &SqlitePool, job_id: i64) -> Result<()> {
    let deleted = sqlx::query("DELETE FROM analysis_retry_queue WHERE id = ?")
        .bind(job_id)
        .execute(pool)
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Retry job not found: {}", job_id)));
    }

    Ok(())
}

/// Per-status counts plus total
pub async fn stats(pool: &SqlitePool) -> Result<RetryQueueStats> {
    let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM analysis_retry_queue GROUP BY status")
        .fetch_all(pool)
        .await?;

    let mut stats = RetryQueueStats::default();
    for row in rows {
        let status: String = row.get("status");
        let n: i64 = row.get("n");
        match RetryStatus::parse(&status) {
            Some(RetryStatus::Pending) => stats.pending = n,
            Some(RetryStatus::Processing) => stats.processing = n,
            Some(RetryStatus::Completed) => stats.completed = n,
            Some(RetryStatus::Failed) => stats.failed = n,
            None => tracing::warn!(status = %status, "Unknown retry job status in queue"),
        }
        stats.total += n;
    }

    Ok(stats)
}

/// Paginated job listing for the admin dashboard, most recently updated
/// first, optionally filtered by status. Returns the page and the total
/// count matching the filter.
pub async fn list(
    pool: &SqlitePool,
    status: Option<RetryStatus>,
    page: u32,
    page_size: u32,
) -> Result<(Vec<RetryJob>, i64)> {
    let page = page.max(1);
    let offset = (page - 1) as i64 * page_size as i64;

    let (rows, total) = match status {
        Some(status) => {
            let rows = sqlx::query(
                r#"
                SELECT id, reading_id, player_id, attempts, max_attempts,
                       last_error, status, next_retry_at, created_at, updated_at
                FROM analysis_retry_queue
                WHERE status = ?
                ORDER BY updated_at DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(status.as_str())
            .bind(page_size as i64)
            .bind(offset)
            .fetch_all(pool)
            .await?;

            let total: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM analysis_retry_queue WHERE status = ?")
                    .bind(status.as_str())
                    .fetch_one(pool)
                    .await?;

            (rows, total)
        }
        None => {
            let rows = sqlx::query(
                r#"
                SELECT id, reading_id, player_id, attempts, max_attempts,
                       last_error, status, next_retry_at, created_at, updated_at
                FROM analysis_retry_queue
                ORDER BY updated_at DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(page_size as i64)
            .bind(offset)
            .fetch_all(pool)
            .await?;

            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analysis_retry_queue")
                .fetch_one(pool)
                .await?;

            (rows, total)
        }
    };

    let jobs = rows
        .into_iter()
        .map(job_from_row)
        .collect::<Result<Vec<_>>>()?;

    Ok((jobs, total))
}

fn job_from_row(row: sqlx::sqlite::SqliteRow) -> Result<RetryJob> {
    let reading_id: String = row.get("reading_id");
    let reading_id = Uuid::parse_str(&reading_id)
        .map_err(|e| Error::Internal(format!("Failed to parse reading id: {}", e)))?;

    let player_id: String = row.get("player_id");
    let player_id = Uuid::parse_str(&player_id)
        .map_err(|e| Error::Internal(format!("Failed to parse player id: {}", e)))?;

    let status: String = row.get("status");
    let status = RetryStatus::parse(&status)
        .ok_or_else(|| Error::Internal(format!("Unknown retry job status: {}", status)))?;

    let next_retry_at: String = row.get("next_retry_at");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(RetryJob {
        id: row.get("id"),
        reading_id,
        player_id,
        attempts: row.get::<i64, _>("attempts") as u32,
        max_attempts: row.get::<i64, _>("max_attempts") as u32,
        last_error: row.get("last_error"),
        status,
        next_retry_at: parse_db_timestamp(&next_retry_at)?,
        created_at: parse_db_timestamp(&created_at)?,
        updated_at: parse_db_timestamp(&updated_at)?,
    })
}
