//! Reading ingestion API handlers
//!
//! Persistence of a reading is unconditionally prioritized over analysis: a
//! structurally valid reading is saved first and always answered with
//! success; any analysis failure is isolated to the analysis subsystem and
//! reported through the response message.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{HealthReading, PlayerInfo, Severity, VitalMetrics};
use crate::AppState;

/// POST /readings request
#[derive(Debug, Deserialize)]
pub struct NewReadingRequest {
    pub player_id: Uuid,
    pub temperature: f64,
    pub heart_rate: f64,
    pub blood_oxygen: f64,
    pub hydration: f64,
    pub respiration: f64,
    pub fatigue: f64,
    /// Sample time; defaults to the ingestion time
    pub recorded_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// POST /readings response
#[derive(Debug, Serialize)]
pub struct ReadingResponse {
    pub success: bool,
    pub data: HealthReading,
    /// Human-readable analysis status for alert readings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// POST /readings
///
/// Classifies the reading, persists it, and for alert severity races a
/// synchronous analysis attempt against the inline deadline before
/// responding.
pub async fn create_reading(
    State(state): State<AppState>,
    Json(request): Json<NewReadingRequest>,
) -> ApiResult<Json<ReadingResponse>> {
    let metrics = VitalMetrics {
        temperature: request.temperature,
        heart_rate: request.heart_rate,
        blood_oxygen: request.blood_oxygen,
        hydration: request.hydration,
        respiration: request.respiration,
        fatigue: request.fatigue,
    };
    if !metrics.is_finite() {
        return Err(ApiError::BadRequest(
            "Metric values must be finite numbers".to_string(),
        ));
    }

    let recorded_at = request.recorded_at.unwrap_or_else(vitalwatch_common::time::now);
    let mut reading = HealthReading::new(request.player_id, metrics, recorded_at);

    // Persist first; nothing below may lose the reading
    db::readings::insert_reading(&state.db, &reading).await?;

    tracing::info!(
        reading_id = %reading.id,
        player_id = %reading.player_id,
        state = reading.state.as_str(),
        "Recorded health reading"
    );

    let player = match db::players::get_player_info(&state.db, reading.player_id).await {
        Ok(Some(player)) => player,
        Ok(None) => {
            tracing::warn!(
                player_id = %reading.player_id,
                "Player not found, using placeholder for analysis"
            );
            PlayerInfo::placeholder()
        }
        Err(err) => {
            tracing::warn!(
                player_id = %reading.player_id,
                error = %err,
                "Player lookup failed, using placeholder for analysis"
            );
            PlayerInfo::placeholder()
        }
    };

    let (result, mut message) = match reading.state {
        Severity::Alert => {
            let result = state.analyzer.analyze_or_fallback(&reading, &player).await;
            let message = if result.is_verified() {
                "Alert reading recorded. Analysis succeeded."
            } else {
                "Alert reading recorded with preliminary analysis. \
                 Comprehensive analysis pending retry."
            };
            (result, Some(message.to_string()))
        }
        _ => (state.analyzer.basic(&reading, &player), None),
    };

    if let Err(err) = db::readings::set_analysis(&state.db, reading.id, &result).await {
        tracing::error!(
            reading_id = %reading.id,
            error = %err,
            "Failed to store analysis on reading"
        );
        // A store failure for an alert reading is recoverable via the queue
        if reading.state == Severity::Alert {
            if let Err(queue_err) = db::retry_queue::enqueue(
                &state.db,
                reading.id,
                reading.player_id,
                &format!("Failed to store analysis: {}", err),
            )
            .await
            {
                tracing::error!(
                    reading_id = %reading.id,
                    error = %queue_err,
                    "Failed to queue analysis retry"
                );
            }
            message = Some("Alert reading recorded. Analysis failed and queued for retry.".to_string());
        }
    }

    reading.analysis = Some(result);

    Ok(Json(ReadingResponse {
        success: true,
        data: reading,
        message,
    }))
}

/// GET /readings/:id
pub async fn get_reading(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<HealthReading>> {
    let reading = db::readings::get_reading(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Reading not found: {}", id)))?;

    Ok(Json(reading))
}

/// Build reading routes
pub fn reading_routes() -> Router<AppState> {
    Router::new()
        .route("/readings", post(create_reading))
        .route("/readings/:id", get(get_reading))
}
