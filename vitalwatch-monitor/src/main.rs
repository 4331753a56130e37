//! vitalwatch-monitor - Vital-Sign Monitoring Service
//!
//! Ingests periodic vital-sign readings for monitored players, classifies
//! severity, and guarantees that every alert reading eventually receives a
//! structured analysis from the external analysis service. Failed analyses
//! land in a durable retry queue drained by a background worker with
//! exponential backoff.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vitalwatch_monitor::config::{resolve_analysis_api_key, MonitorConfig};
use vitalwatch_monitor::services::{AnalysisClient, Analyzer};
use vitalwatch_monitor::worker::RetryWorker;
use vitalwatch_monitor::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting vitalwatch-monitor");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 1: Resolve and prepare the root data folder
    let root_folder = vitalwatch_common::config::resolve_root_folder(None);
    vitalwatch_common::config::ensure_root_folder(&root_folder)
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    // Step 2: Open or create the database
    let db_path = vitalwatch_common::config::database_path(&root_folder);
    info!("Database: {}", db_path.display());

    let db_pool = vitalwatch_monitor::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Step 3: Load configuration (defaults -> TOML -> environment)
    let toml_path = vitalwatch_common::config::service_config_path(&root_folder);
    let toml_config = vitalwatch_common::config::load_toml_config(&toml_path)
        .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", toml_path.display(), e))?;

    let mut config = MonitorConfig::from_sources(&toml_config);
    config.analysis_api_key = resolve_analysis_api_key(&db_pool, &toml_config).await?;
    info!("Analysis service: {}", config.analysis_base_url);

    // Step 4: Analysis client and invoker
    let client = match AnalysisClient::new(
        config.analysis_base_url.clone(),
        config.analysis_api_key.clone(),
    ) {
        Ok(client) => Some(client),
        Err(err) => {
            tracing::error!(error = %err, "Failed to initialize analysis client");
            None
        }
    };
    let analyzer = Analyzer::new(
        db_pool.clone(),
        client,
        config.inline_deadline,
        config.worker_deadline,
    );

    let port = config.port;
    let worker_config = config.worker.clone();
    let state = AppState::new(db_pool.clone(), config, analyzer);

    // Step 5: Start the retry worker
    let worker = RetryWorker::new(
        db_pool,
        Arc::clone(&state.analyzer),
        worker_config,
        Arc::clone(&state.worker_status),
    );
    let _worker_handle = worker.start();

    // Step 6: Serve the HTTP API
    let app = vitalwatch_monitor::build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!("Listening on http://127.0.0.1:{}", port);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app).await?;

    Ok(())
}
