//! Analysis invoker
//!
//! Two entry points with different failure contracts:
//!
//! - [`Analyzer::attempt`] is one bounded external call with no side effects.
//!   The retry worker uses it; a failure there becomes a job failure.
//! - [`Analyzer::analyze_or_fallback`] is the inline ingestion path for alert
//!   readings: any failure yields a tagged fallback result AND enqueues a
//!   retry job for the reading. It never fails.

use sqlx::SqlitePool;
use std::time::Duration;

use crate::db;
use crate::models::{
    Analysis, AnalysisResult, FallbackReason, HealthReading, NormalRanges, PlayerInfo,
};
use crate::services::analysis_client::{AnalysisClient, AnalysisError, AnalyzeRequest};
use crate::services::fallback;

/// Analysis invoker shared by the ingestion path and the retry worker
pub struct Analyzer {
    db: SqlitePool,
    client: Option<AnalysisClient>,
    inline_deadline: Duration,
    worker_deadline: Duration,
}

impl Analyzer {
    pub fn new(
        db: SqlitePool,
        client: Option<AnalysisClient>,
        inline_deadline: Duration,
        worker_deadline: Duration,
    ) -> Self {
        if client.is_none() {
            tracing::warn!(
                "Analysis service not configured; alert readings will receive fallback analyses"
            );
        }

        Self {
            db,
            client,
            inline_deadline,
            worker_deadline,
        }
    }

    /// Deadline for retry-worker attempts (the worker is not latency-sensitive)
    pub fn worker_deadline(&self) -> Duration {
        self.worker_deadline
    }

    /// The underlying service client, when configured. The enhanced-analysis
    /// path calls it directly with its own request shape.
    pub fn client(&self) -> Option<&AnalysisClient> {
        self.client.as_ref()
    }

    /// One bounded external attempt. No queue side effects; the caller
    /// decides what a failure means.
    pub async fn attempt(
        &self,
        reading: &HealthReading,
        player: &PlayerInfo,
        deadline: Duration,
    ) -> Result<Analysis, AnalysisError> {
        let client = self.client.as_ref().ok_or(AnalysisError::NotConfigured)?;

        let request = AnalyzeRequest {
            player: player.clone(),
            state: reading.state,
            metrics: reading.metrics,
            normal_ranges: NormalRanges::default(),
        };

        client.analyze(&request, deadline).await
    }

    /// Inline path for alert readings: race the external call against the
    /// inline deadline; on any failure return the alert fallback and queue a
    /// retry for this reading. Queue failures are logged, never propagated,
    /// since the reading is already persisted and the response must not block.
    pub async fn analyze_or_fallback(
        &self,
        reading: &HealthReading,
        player: &PlayerInfo,
    ) -> AnalysisResult {
        match self.attempt(reading, player, self.inline_deadline).await {
            Ok(analysis) => AnalysisResult::Verified { analysis },
            Err(err) => {
                tracing::warn!(
                    reading_id = %reading.id,
                    error = %err,
                    "Inline analysis failed, queueing retry"
                );

                if let Err(queue_err) =
                    db::retry_queue::enqueue(&self.db, reading.id, reading.player_id, &err.to_string())
                        .await
                {
                    tracing::error!(
                        reading_id = %reading.id,
                        error = %queue_err,
                        "Failed to queue analysis retry"
                    );
                }

                let reason = if err.is_timeout() {
                    FallbackReason::TimedOut
                } else {
                    FallbackReason::ServiceError
                };

                AnalysisResult::Fallback {
                    analysis: fallback::alert_fallback(&reading.metrics, player),
                    reason,
                }
            }
        }
    }

    /// Local analysis for non-alert readings. The external service is not
    /// consulted and no retry is guaranteed for these.
    pub fn basic(&self, reading: &HealthReading, player: &PlayerInfo) -> AnalysisResult {
        AnalysisResult::Fallback {
            analysis: fallback::basic_analysis(&reading.metrics, reading.state, player),
            reason: FallbackReason::NotRequested,
        }
    }
}
