//! Retry worker integration tests against a loopback analysis service
//!
//! A tiny axum instance stands in for the external analysis service, so the
//! success paths (verified analyses, completed jobs) are exercised end to
//! end without leaving the machine.

use axum::{http::StatusCode, routing::post, Json, Router};
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use vitalwatch_common::time::{now, to_db_timestamp};
use vitalwatch_monitor::db;
use vitalwatch_monitor::models::{HealthReading, Player, RetryStatus, VitalMetrics};
use vitalwatch_monitor::services::{AnalysisClient, Analyzer};
use vitalwatch_monitor::worker::{drain_due, RetryWorker, WorkerConfig, WorkerStatus};

/// Spawn a stub analysis service returning the given status and body for
/// every analyze request. Returns its base URL.
async fn spawn_stub_service(status: StatusCode, body: serde_json::Value) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new().route(
        "/v1/analyze",
        post(move || {
            let body = body.clone();
            async move { (status, Json(body)) }
        }),
    );

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn verified_analysis_body() -> serde_json::Value {
    json!({
        "summary": "Player shows acute heat stress and requires immediate cooling.",
        "recommendations": ["Remove from play", "Begin cooling protocol", "Rehydrate"],
        "risk_level": "high",
        "potential_issues": ["Hyperthermia", "Severe dehydration"],
        "replacement_needed": true,
        "recovery_time_estimate": "24-48 hours",
        "priority_action": "Immediate medical evaluation"
    })
}

async fn test_pool() -> SqlitePool {
    // Single connection so every task sees the same in-memory database
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::init_tables(&pool).await.unwrap();
    pool
}

fn analyzer_for(pool: &SqlitePool, base_url: &str) -> Analyzer {
    let client = AnalysisClient::new(base_url.to_string(), None).unwrap();
    Analyzer::new(
        pool.clone(),
        Some(client),
        Duration::from_secs(2),
        Duration::from_secs(2),
    )
}

fn alert_reading(player_id: Uuid) -> HealthReading {
    HealthReading::new(
        player_id,
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

async fn seed_player(pool: &SqlitePool) -> Uuid {
    let player = Player {
        id: Uuid::new_v4(),
        name: "Sam Ortiz".to_string(),
        position: "Forward".to_string(),
        team: None,
        jersey_number: Some(9),
        created_at: now(),
        updated_at: now(),
    };
    db::players::insert_player(pool, &player).await.unwrap();
    player.id
}

/// Enqueue a retry job for the reading and force it due
async fn enqueue_due(pool: &SqlitePool, reading: &HealthReading) -> i64 {
    let job_id = db::retry_queue::enqueue(pool, reading.id, reading.player_id, "inline failure")
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
async fn test_drain_completes_job_and_writes_verified_analysis() {
    let pool = test_pool().await;
    let base_url = spawn_stub_service(StatusCode::OK, verified_analysis_body()).await;
    let analyzer = analyzer_for(&pool, &base_url);

    let player_id = seed_player(&pool).await;
    let reading = alert_reading(player_id);
    db::readings::insert_reading(&pool, &reading).await.unwrap();
    let job_id = enqueue_due(&pool, &reading).await;

    let summary = drain_due(&pool, &analyzer, 10).await;
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);

    let job = db::retry_queue::get_job(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, RetryStatus::Completed);

    // The reading now carries a verified analysis from the service
    let stored = db::readings::get_reading(&pool, reading.id)
        .await
        .unwrap()
        .unwrap()
        .analysis
        .unwrap();
    assert!(stored.is_verified());
    assert!(stored.analysis().summary.contains("acute heat stress"));
}

#[tokio::test]
async fn test_drain_completes_with_placeholder_when_player_missing() {
    let pool = test_pool().await;
    let base_url = spawn_stub_service(StatusCode::OK, verified_analysis_body()).await;
    let analyzer = analyzer_for(&pool, &base_url);

    // Reading exists, player row does not
    let reading = alert_reading(Uuid::new_v4());
    db::readings::insert_reading(&pool, &reading).await.unwrap();
    let job_id = enqueue_due(&pool, &reading).await;

    let summary = drain_due(&pool, &analyzer, 10).await;
    assert_eq!(summary.succeeded, 1);

    let job = db::retry_queue::get_job(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, RetryStatus::Completed);
}

#[tokio::test]
async fn test_drain_reschedules_on_server_error() {
    let pool = test_pool().await;
    let base_url = spawn_stub_service(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"error": "model overloaded"}),
    )
    .await;
    let analyzer = analyzer_for(&pool, &base_url);

    let reading = alert_reading(Uuid::new_v4());
    db::readings::insert_reading(&pool, &reading).await.unwrap();
    let job_id = enqueue_due(&pool, &reading).await;

    let summary = drain_due(&pool, &analyzer, 10).await;
    assert_eq!(summary.failed, 1);

    let job = db::retry_queue::get_job(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, RetryStatus::Pending);
    assert_eq!(job.attempts, 1);
    assert!(job.last_error.as_deref().unwrap().contains("API error 500"));
    // No analysis was written
    let stored = db::readings::get_reading(&pool, reading.id).await.unwrap().unwrap();
    assert!(stored.analysis.is_none());
}

#[tokio::test]
async fn test_drain_reschedules_on_malformed_response() {
    let pool = test_pool().await;
    let base_url = spawn_stub_service(StatusCode::OK, json!({"unexpected": "shape"})).await;
    let analyzer = analyzer_for(&pool, &base_url);

    let reading = alert_reading(Uuid::new_v4());
    db::readings::insert_reading(&pool, &reading).await.unwrap();
    let job_id = enqueue_due(&pool, &reading).await;

    let summary = drain_due(&pool, &analyzer, 10).await;
    assert_eq!(summary.failed, 1);

    let job = db::retry_queue::get_job(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, RetryStatus::Pending);
    assert!(job.last_error.as_deref().unwrap().contains("Parse error"));
}

#[tokio::test]
async fn test_worker_loop_drains_queue_end_to_end() {
    let pool = test_pool().await;
    let base_url = spawn_stub_service(StatusCode::OK, verified_analysis_body()).await;
    let analyzer = Arc::new(analyzer_for(&pool, &base_url));

    let player_id = seed_player(&pool).await;
    let reading = alert_reading(player_id);
    db::readings::insert_reading(&pool, &reading).await.unwrap();
    let job_id = enqueue_due(&pool, &reading).await;

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

    // The first pass runs immediately; give the loop a moment to finish it
    let mut completed = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let job = db::retry_queue::get_job(&pool, job_id).await.unwrap().unwrap();
        if job.status == RetryStatus::Completed {
            completed = true;
            break;
        }
    }
    handle.stop();

    assert!(completed, "worker did not complete the due job in time");
    assert!(status.last_error.read().await.is_none());
}

#[tokio::test]
async fn test_inline_ingestion_with_live_service_creates_no_job() {
    let pool = test_pool().await;
    let base_url = spawn_stub_service(StatusCode::OK, verified_analysis_body()).await;
    let analyzer = analyzer_for(&pool, &base_url);

    let player_id = seed_player(&pool).await;
    let reading = alert_reading(player_id);

    let player = db::players::get_player_info(&pool, player_id)
        .await
        .unwrap()
        .unwrap();
    let result = analyzer.analyze_or_fallback(&reading, &player).await;

    // External call won the race: verified result, no retry job
    assert!(result.is_verified());
    let stats = db::retry_queue::stats(&pool).await.unwrap();
    assert_eq!(stats.total, 0);
}

#[tokio::test]
async fn test_exhaustion_after_repeated_drains() {
    let pool = test_pool().await;
    let base_url = spawn_stub_service(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"error": "still broken"}),
    )
    .await;
    let analyzer = analyzer_for(&pool, &base_url);

    let reading = alert_reading(Uuid::new_v4());
    db::readings::insert_reading(&pool, &reading).await.unwrap();
    let job_id = enqueue_due(&pool, &reading).await;

    // Five failed drains exhaust the default attempt ceiling
    for round in 1..=5u32 {
        // Re-force the job due; each failure pushes next_retry_at out
        let past = to_db_timestamp(now() - chrono::Duration::seconds(60));
        sqlx::query("UPDATE analysis_retry_queue SET next_retry_at = ? WHERE id = ?")
            .bind(past)
            .bind(job_id)
            .execute(&pool)
            .await
            .unwrap();

        drain_due(&pool, &analyzer, 10).await;

        let job = db::retry_queue::get_job(&pool, job_id).await.unwrap().unwrap();
        assert_eq!(job.attempts, round);
    }

    let job = db::retry_queue::get_job(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, RetryStatus::Failed);
    assert_eq!(job.attempts, 5);

    // Operator reset revives it
    db::retry_queue::reset(&pool, job_id).await.unwrap();
    let job = db::retry_queue::get_job(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, RetryStatus::Pending);
    assert_eq!(job.attempts, 0);
}
