//! Database access for vitalwatch-monitor
//!
//! SQLite via sqlx. All timestamps are stored as RFC 3339 UTC text with
//! millisecond precision so lexicographic comparison in SQL matches
//! chronological order (see `vitalwatch_common::time`).

pub mod lease;
pub mod players;
pub mod readings;
pub mod retry_queue;
pub mod settings;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects to vitalwatch.db in the root folder, creating it if missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Initialize tables if they don't exist
///
/// Also used by tests against `sqlite::memory:` pools.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS players (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            position TEXT NOT NULL,
            team TEXT,
            jersey_number INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS health_readings (
            id TEXT PRIMARY KEY,
            player_id TEXT NOT NULL,
            temperature REAL NOT NULL,
            heart_rate REAL NOT NULL,
            blood_oxygen REAL NOT NULL,
            hydration REAL NOT NULL,
            respiration REAL NOT NULL,
            fatigue REAL NOT NULL,
            state TEXT NOT NULL,
            analysis TEXT,
            recorded_at TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_readings_player_recorded
            ON health_readings(player_id, recorded_at)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_retry_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            reading_id TEXT NOT NULL,
            player_id TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            max_attempts INTEGER NOT NULL DEFAULT 5,
            last_error TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            next_retry_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // At most one active job per reading; enqueue upserts against this index
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_retry_queue_active_reading
            ON analysis_retry_queue(reading_id)
            WHERE status IN ('pending', 'processing')
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS worker_lease (
            name TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!(
        "Database tables initialized (players, health_readings, analysis_retry_queue, worker_lease, settings)"
    );

    Ok(())
}
