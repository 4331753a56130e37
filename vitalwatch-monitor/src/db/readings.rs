//! Health reading database operations

use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use vitalwatch_common::time::{now_db_timestamp, parse_db_timestamp, to_db_timestamp};
use vitalwatch_common::{Error, Result};

use crate::models::{AnalysisResult, HealthReading, Severity, VitalMetrics};

/// Insert a new reading. The `analysis` column starts NULL; it is written
/// later by the inline analysis path or the retry worker.
pub async fn insert_reading(pool: &SqlitePool, reading: &HealthReading) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO health_readings (
            id, player_id, temperature, heart_rate, blood_oxygen,
            hydration, respiration, fatigue, state, recorded_at, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(reading.id.to_string())
    .bind(reading.player_id.to_string())
    .bind(reading.metrics.temperature)
    .bind(reading.metrics.heart_rate)
    .bind(reading.metrics.blood_oxygen)
    .bind(reading.metrics.hydration)
    .bind(reading.metrics.respiration)
    .bind(reading.metrics.fatigue)
    .bind(reading.state.as_str())
    .bind(to_db_timestamp(reading.recorded_at))
    .bind(to_db_timestamp(reading.created_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load one reading with its analysis (if any)
pub async fn get_reading(pool: &SqlitePool, id: Uuid) -> Result<Option<HealthReading>> {
    let row = sqlx::query(
        r#"
        SELECT id, player_id, temperature, heart_rate, blood_oxygen,
               hydration, respiration, fatigue, state, analysis,
               recorded_at, created_at
        FROM health_readings
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(reading_from_row).transpose()
}

/// Write an analysis result onto a reading.
///
/// Overwrites any earlier result; a later successful retry replaces an
/// inline fallback.
pub async fn set_analysis(pool: &SqlitePool, id: Uuid, result: &AnalysisResult) -> Result<()> {
    let payload = serde_json::to_string(result)
        .map_err(|e| Error::Internal(format!("Failed to serialize analysis: {}", e)))?;

    let updated = sqlx::query("UPDATE health_readings SET analysis = ? WHERE id = ?")
        .bind(payload)
        .bind(id.to_string())
        .execute(pool)
        .await?;

    if updated.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Reading not found: {}", id)));
    }

    Ok(())
}

/// Most recent readings for a player recorded strictly before `before`,
/// oldest first. Backs the history-aware enhanced analysis.
pub async fn recent_for_player(
    pool: &SqlitePool,
    player_id: Uuid,
    before: chrono::DateTime<chrono::Utc>,
    limit: u32,
) -> Result<Vec<HealthReading>> {
    let rows = sqlx::query(
        r#"
        SELECT id, player_id, temperature, heart_rate, blood_oxygen,
               hydration, respiration, fatigue, state, analysis,
               recorded_at, created_at
        FROM health_readings
        WHERE player_id = ? AND recorded_at < ?
        ORDER BY recorded_at DESC
        LIMIT ?
        "#,
    )
    .bind(player_id.to_string())
    .bind(to_db_timestamp(before))
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    let mut readings = rows
        .into_iter()
        .map(reading_from_row)
        .collect::<Result<Vec<_>>>()?;
    readings.reverse();
    Ok(readings)
}

fn reading_from_row(row: sqlx::sqlite::SqliteRow) -> Result<HealthReading> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id)
        .map_err(|e| Error::Internal(format!("Failed to parse reading id: {}", e)))?;

    let player_id: String = row.get("player_id");
    let player_id = Uuid::parse_str(&player_id)
        .map_err(|e| Error::Internal(format!("Failed to parse player id: {}", e)))?;

    let state: String = row.get("state");
    let state = Severity::parse(&state)
        .ok_or_else(|| Error::Internal(format!("Unknown reading state: {}", state)))?;

    let analysis: Option<String> = row.get("analysis");
    let analysis = analysis
        .map(|raw| {
            serde_json::from_str::<AnalysisResult>(&raw)
                .map_err(|e| Error::Internal(format!("Failed to deserialize analysis: {}", e)))
        })
        .transpose()?;

    let recorded_at: String = row.get("recorded_at");
    let created_at: String = row.get("created_at");

    Ok(HealthReading {
        id,
        player_id,
        metrics: VitalMetrics {
            temperature: row.get("temperature"),
            heart_rate: row.get("heart_rate"),
            blood_oxygen: row.get("blood_oxygen"),
            hydration: row.get("hydration"),
            respiration: row.get("respiration"),
            fatigue: row.get("fatigue"),
        },
        state,
        analysis,
        recorded_at: parse_db_timestamp(&recorded_at)?,
        created_at: parse_db_timestamp(&created_at)?,
    })
}
