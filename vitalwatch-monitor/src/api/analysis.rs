//! Enhanced analysis API handler

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{EnhancedAnalysis, PlayerInfo};
use crate::services::enhanced;
use crate::AppState;

/// POST /analysis/enhanced request
#[derive(Debug, Deserialize)]
pub struct EnhancedAnalysisRequest {
    pub reading_id: Uuid,
}

/// POST /analysis/enhanced
///
/// History-aware assessment of one reading. Degrades to deterministic local
/// variants when history is sparse or the analysis service fails; the
/// `confidence_level` field reflects that.
pub async fn enhanced_analysis(
    State(state): State<AppState>,
    Json(request): Json<EnhancedAnalysisRequest>,
) -> ApiResult<Json<EnhancedAnalysis>> {
    let reading = db::readings::get_reading(&state.db, request.reading_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Reading not found: {}", request.reading_id)))?;

    let player = match db::players::get_player_info(&state.db, reading.player_id).await {
        Ok(Some(player)) => player,
        Ok(None) | Err(_) => PlayerInfo::placeholder(),
    };

    let analysis = enhanced::enhanced_analysis(
        &state.db,
        state.analyzer.client(),
        &reading,
        &player,
        state.analyzer.worker_deadline(),
    )
    .await?;

    Ok(Json(analysis))
}

/// Build enhanced analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new().route("/analysis/enhanced", post(enhanced_analysis))
}
