//! Retry queue admin API handlers
//!
//! Operator surface for the analysis retry queue: listing, stats, manual
//! reset, purge, and on-demand draining.

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{RetryJob, RetryQueueStats, RetryStatus};
use crate::worker::{self, DrainSummary};
use crate::AppState;

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

/// Default job count for an on-demand drain
const DEFAULT_DRAIN_LIMIT: u32 = 5;

/// GET /admin/retry-queue query parameters
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// pending | processing | completed | failed | all (default)
    pub status: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// GET /admin/retry-queue response
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub items: Vec<RetryJob>,
    /// Total jobs matching the filter, across all pages
    pub count: i64,
}

/// GET /admin/retry-queue
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ListResponse>> {
    let status = match query.status.as_deref() {
        None | Some("all") => None,
        Some(raw) => Some(
            RetryStatus::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown status filter: {}", raw)))?,
        ),
    };

    let page = query.page.unwrap_or(1).max(1);
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let (items, count) = db::retry_queue::list(&state.db, status, page, page_size).await?;

    Ok(Json(ListResponse { items, count }))
}

/// GET /admin/retry-queue/stats
pub async fn queue_stats(State(state): State<AppState>) -> ApiResult<Json<RetryQueueStats>> {
    let stats = db::retry_queue::stats(&state.db).await?;
    Ok(Json(stats))
}

/// Response for reset/delete operations
#[derive(Debug, Serialize)]
pub struct JobActionResponse {
    pub status: String,
    pub job_id: i64,
}

/// POST /admin/retry-queue/:id/reset
///
/// Operator recovery: any job, including failed or completed, back to
/// pending with zero attempts.
pub async fn reset_job(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> ApiResult<Json<JobActionResponse>> {
    db::retry_queue::reset(&state.db, job_id).await?;

    tracing::info!(job_id, "Retry job reset by operator");

    Ok(Json(JobActionResponse {
        status: "reset".to_string(),
        job_id,
    }))
}

/// DELETE /admin/retry-queue/:id
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> ApiResult<Json<JobActionResponse>> {
    db::retry_queue::delete(&state.db, job_id).await?;

    tracing::info!(job_id, "Retry job deleted by operator");

    Ok(Json(JobActionResponse {
        status: "deleted".to_string(),
        job_id,
    }))
}

/// POST /admin/retry-queue/process request
#[derive(Debug, Default, Deserialize)]
pub struct ProcessRequest {
    pub limit: Option<u32>,
}

/// POST /admin/retry-queue/process
///
/// On-demand drain of up to `limit` due jobs, sharing the worker's drain
/// routine.
pub async fn process_jobs(
    State(state): State<AppState>,
    request: Option<Json<ProcessRequest>>,
) -> ApiResult<Json<DrainSummary>> {
    let limit = request
        .and_then(|Json(request)| request.limit)
        .unwrap_or(DEFAULT_DRAIN_LIMIT);

    let summary = worker::drain_due(&state.db, &state.analyzer, limit).await;

    Ok(Json(summary))
}

/// Build admin routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/retry-queue", get(list_jobs))
        .route("/admin/retry-queue/stats", get(queue_stats))
        .route("/admin/retry-queue/:id/reset", post(reset_job))
        .route("/admin/retry-queue/:id", delete(delete_job))
        .route("/admin/retry-queue/process", post(process_jobs))
}
