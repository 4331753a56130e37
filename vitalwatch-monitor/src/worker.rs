//! Background retry worker
//!
//! Periodically drains due analysis retry jobs. One pass runs immediately on
//! start, then on a fixed period. Within the process a pass that is still
//! running when the timer fires causes the new tick to be skipped, not
//! queued; across processes a durable lease row keeps multiple instances
//! from double-processing the same jobs.
//!
//! All worker state lives in [`RetryWorker`] and its shared
//! [`WorkerStatus`]; the loop itself never terminates on an error.

use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db;
use crate::models::{AnalysisResult, PlayerInfo, RetryJob};
use crate::services::Analyzer;

/// Worker tunables
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Time between drain passes
    pub period: Duration,
    /// Maximum jobs processed per pass
    pub batch_size: u32,
    /// Durable lease TTL; must comfortably exceed one pass
    pub lease_ttl: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(30),
            batch_size: 3,
            lease_ttl: Duration::from_secs(90),
        }
    }
}

/// Shared worker state, surfaced by the health endpoint
#[derive(Default)]
pub struct WorkerStatus {
    draining: AtomicBool,
    /// Last drain error for diagnostics
    pub last_error: RwLock<Option<String>>,
}

impl WorkerStatus {
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }
}

/// Handle returned by [`RetryWorker::start`]; dropping it does not stop the
/// worker, calling [`WorkerHandle::stop`] does.
pub struct WorkerHandle {
    cancel: CancellationToken,
}

impl WorkerHandle {
    /// Halt future drain passes. A pass already in flight finishes.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

/// The background retry worker
pub struct RetryWorker {
    db: SqlitePool,
    analyzer: Arc<Analyzer>,
    config: WorkerConfig,
    status: Arc<WorkerStatus>,
    /// Identifies this instance in the durable lease
    owner: Uuid,
}

impl RetryWorker {
    pub fn new(
        db: SqlitePool,
        analyzer: Arc<Analyzer>,
        config: WorkerConfig,
        status: Arc<WorkerStatus>,
    ) -> Self {
        Self {
            db,
            analyzer,
            config,
            status,
            owner: Uuid::new_v4(),
        }
    }

    /// Spawn the periodic drain loop and return its stop handle
    pub fn start(self) -> WorkerHandle {
        let cancel = CancellationToken::new();
        let handle = WorkerHandle {
            cancel: cancel.clone(),
        };

        tracing::info!(
            period_secs = self.config.period.as_secs(),
            batch_size = self.config.batch_size,
            "Starting analysis retry worker"
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.period);
            // Skip, never queue, ticks missed while a pass is running
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Stopping analysis retry worker");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.run_pass().await;
                    }
                }
            }
        });

        handle
    }

    async fn run_pass(&self) {
        if self.status.draining.swap(true, Ordering::SeqCst) {
            tracing::debug!("Previous drain pass still running, skipping");
            return;
        }

        match db::lease::try_acquire(
            &self.db,
            db::lease::DRAIN_LEASE,
            self.owner,
            self.config.lease_ttl,
        )
        .await
        {
            Ok(true) => {
                let summary = drain_due(&self.db, &self.analyzer, self.config.batch_size).await;

                if summary.processed > 0 {
                    tracing::info!(
                        processed = summary.processed,
                        succeeded = summary.succeeded,
                        failed = summary.failed,
                        "Drained analysis retry queue"
                    );
                }
                if summary.failed > 0 {
                    *self.status.last_error.write().await = Some(format!(
                        "{} retry job(s) failed in last drain pass",
                        summary.failed
                    ));
                }

                if let Err(err) =
                    db::lease::release(&self.db, db::lease::DRAIN_LEASE, self.owner).await
                {
                    tracing::warn!(error = %err, "Failed to release drain lease");
                }
            }
            Ok(false) => {
                tracing::debug!("Drain lease held by another instance, skipping pass");
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to acquire drain lease");
                *self.status.last_error.write().await = Some(err.to_string());
            }
        }

        self.status.draining.store(false, Ordering::SeqCst);
    }
}

/// Outcome of one drain pass
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct DrainSummary {
    pub processed: u32,
    pub succeeded: u32,
    pub failed: u32,
}

/// Drain up to `limit` due jobs. Shared by the worker loop and the admin
/// on-demand drain endpoint. One job's failure never aborts the batch.
pub async fn drain_due(pool: &SqlitePool, analyzer: &Analyzer, limit: u32) -> DrainSummary {
    let jobs = match db::retry_queue::select_due(pool, limit).await {
        Ok(jobs) => jobs,
        Err(err) => {
            tracing::error!(error = %err, "Failed to fetch due retry jobs");
            return DrainSummary::default();
        }
    };

    let mut summary = DrainSummary {
        processed: jobs.len() as u32,
        ..DrainSummary::default()
    };

    for job in jobs {
        if let Err(err) = db::retry_queue::mark_processing(pool, job.id).await {
            // Keep going; the job transition is advisory for observers
            tracing::error!(job_id = job.id, error = %err, "Failed to mark job processing");
        }

        match process_job(pool, analyzer, &job).await {
            Ok(()) => {
                if let Err(err) = db::retry_queue::mark_completed(pool, job.id).await {
                    tracing::error!(job_id = job.id, error = %err, "Failed to mark job completed");
                }
                summary.succeeded += 1;
            }
            Err(reason) => {
                tracing::warn!(job_id = job.id, error = %reason, "Analysis retry failed");
                if let Err(err) = db::retry_queue::record_failure(pool, &job, &reason).await {
                    tracing::error!(job_id = job.id, error = %err, "Failed to record job failure");
                }
                summary.failed += 1;
            }
        }
    }

    summary
}

/// One retry attempt for one job. The returned error string is recorded as
/// the job's `last_error`.
async fn process_job(pool: &SqlitePool, analyzer: &Analyzer, job: &RetryJob) -> Result<(), String> {
    let reading = db::readings::get_reading(pool, job.reading_id)
        .await
        .map_err(|err| format!("Failed to fetch reading: {}", err))?
        .ok_or_else(|| format!("Reading not found: {}", job.reading_id))?;

    // A missing player degrades to a placeholder; it must not fail the job
    let player = match db::players::get_player_info(pool, job.player_id).await {
        Ok(Some(player)) => player,
        Ok(None) => {
            tracing::warn!(
                job_id = job.id,
                player_id = %job.player_id,
                "Player not found, using placeholder for retry analysis"
            );
            PlayerInfo::placeholder()
        }
        Err(err) => {
            tracing::warn!(
                job_id = job.id,
                player_id = %job.player_id,
                error = %err,
                "Player lookup failed, using placeholder for retry analysis"
            );
            PlayerInfo::placeholder()
        }
    };

    let analysis = analyzer
        .attempt(&reading, &player, analyzer.worker_deadline())
        .await
        .map_err(|err| format!("Analysis attempt failed: {}", err))?;

    db::readings::set_analysis(pool, reading.id, &AnalysisResult::Verified { analysis })
        .await
        .map_err(|err| format!("Failed to store analysis: {}", err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HealthReading, RetryStatus, VitalMetrics};
    use vitalwatch_common::time::{now, to_db_timestamp};

    async fn test_pool() -> SqlitePool {
        // Single connection: the worker task and the test share one
        // in-memory database
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        pool
    }

    fn unreachable_analyzer(pool: &SqlitePool) -> Analyzer {
        let client =
            crate::services::AnalysisClient::new("http://127.0.0.1:1".to_string(), None).unwrap();
        Analyzer::new(
            pool.clone(),
            Some(client),
            Duration::from_secs(2),
            Duration::from_secs(2),
        )
    }

    fn alert_reading() -> HealthReading {
        HealthReading::new(
            Uuid::new_v4(),
            VitalMetrics {
                temperature: 39.0,
                heart_rate: 130.0,
                blood_oxygen: 85.0,
                hydration: 50.0,
                respiration: 28.0,
                fatigue: 60.0,
            },
            now(),
        )
    }

    async fn enqueue_due(pool: &SqlitePool, reading: &HealthReading) -> i64 {
        let job_id =
            db::retry_queue::enqueue(pool, reading.id, reading.player_id, "initial failure")
                .await
                .unwrap();
        let past = to_db_timestamp(now() - chrono::Duration::seconds(60));
        sqlx::query("UPDATE analysis_retry_queue SET next_retry_at = ? WHERE id = ?")
            .bind(past)
            .bind(job_id)
            .execute(pool)
            .await
            .unwrap();
        job_id
    }

    #[tokio::test]
    async fn test_drain_reschedules_on_service_failure() {
        let pool = test_pool().await;
        let analyzer = unreachable_analyzer(&pool);

        let reading = alert_reading();
        db::readings::insert_reading(&pool, &reading).await.unwrap();
        let job_id = enqueue_due(&pool, &reading).await;

        let summary = drain_due(&pool, &analyzer, 10).await;
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 1);

        let job = db::retry_queue::get_job(&pool, job_id).await.unwrap().unwrap();
        assert_eq!(job.attempts, 1);
        assert_eq!(job.status, RetryStatus::Pending);
        assert!(job
            .last_error
            .as_deref()
            .unwrap()
            .starts_with("Analysis attempt failed"));
    }

    #[tokio::test]
    async fn test_drain_fails_job_for_missing_reading() {
        let pool = test_pool().await;
        let analyzer = unreachable_analyzer(&pool);

        // Job references a reading that was never persisted
        let reading = alert_reading();
        let job_id = enqueue_due(&pool, &reading).await;

        drain_due(&pool, &analyzer, 10).await;

        let job = db::retry_queue::get_job(&pool, job_id).await.unwrap().unwrap();
        assert_eq!(job.attempts, 1);
        assert!(job.last_error.as_deref().unwrap().contains("Reading not found"));
    }

    #[tokio::test]
    async fn test_drain_empty_queue_is_a_no_op() {
        let pool = test_pool().await;
        let analyzer = unreachable_analyzer(&pool);

        let summary = drain_due(&pool, &analyzer, 10).await;
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn test_one_bad_job_does_not_abort_the_batch() {
        let pool = test_pool().await;
        let analyzer = unreachable_analyzer(&pool);

        // First job's reading is missing entirely; second job has a reading
        // but the service is unreachable. Both must be processed.
        let orphan = alert_reading();
        enqueue_due(&pool, &orphan).await;

        let reading = alert_reading();
        db::readings::insert_reading(&pool, &reading).await.unwrap();
        enqueue_due(&pool, &reading).await;

        let summary = drain_due(&pool, &analyzer, 10).await;
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 2);
    }

    #[tokio::test]
    async fn test_worker_start_and_stop() {
        let pool = test_pool().await;
        let analyzer = Arc::new(unreachable_analyzer(&pool));
        let status = Arc::new(WorkerStatus::default());

        let worker = RetryWorker::new(
            pool.clone(),
            analyzer,
            WorkerConfig {
                period: Duration::from_millis(50),
                batch_size: 3,
                lease_ttl: Duration::from_secs(5),
            },
            status.clone(),
        );
        let handle = worker.start();

        // Let the immediate first pass run, then stop
        tokio::time::sleep(Duration::from_millis(120)).await;
        handle.stop();
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(!status.is_draining());
        // Lease was released after the pass
        let lease_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM worker_lease")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(lease_rows, 0);
    }
}
