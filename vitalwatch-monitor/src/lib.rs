//! vitalwatch-monitor library interface
//!
//! Exposes the application state and router for integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod worker;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::MonitorConfig;
use crate::services::Analyzer;
use crate::worker::WorkerStatus;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub config: Arc<MonitorConfig>,
    /// Analysis invoker shared with the retry worker
    pub analyzer: Arc<Analyzer>,
    /// Worker diagnostics surfaced by the health endpoint
    pub worker_status: Arc<WorkerStatus>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: MonitorConfig, analyzer: Analyzer) -> Self {
        Self {
            db,
            config: Arc::new(config),
            analyzer: Arc::new(analyzer),
            worker_status: Arc::new(WorkerStatus::default()),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::reading_routes())
        .merge(api::analysis_routes())
        .merge(api::admin_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
