//! Key/value settings persistence
//!
//! The settings table is the authoritative tier for operator-editable values
//! such as the analysis service API key (see `crate::config`).

use sqlx::SqlitePool;
use vitalwatch_common::Result;

const ANALYSIS_API_KEY: &str = "analysis_api_key";

/// Read one setting
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(value)
}

/// Write one setting (insert or replace)
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Analysis service API key from the database tier
pub async fn get_analysis_api_key(pool: &SqlitePool) -> Result<Option<String>> {
    get_setting(pool, ANALYSIS_API_KEY).await
}

/// Store the analysis service API key in the database tier
pub async fn set_analysis_api_key(pool: &SqlitePool, key: &str) -> Result<()> {
    set_setting(pool, ANALYSIS_API_KEY, key).await
}
