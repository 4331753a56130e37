//! Configuration resolution for vitalwatch-monitor
//!
//! Compiled defaults, overridden by the root-folder TOML file, overridden by
//! `VITALWATCH_*` environment variables. The analysis service API key gets
//! its own three-tier resolution with the database as the authoritative tier.

use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{info, warn};
use vitalwatch_common::config::TomlConfig;
use vitalwatch_common::Result;

use crate::worker::WorkerConfig;

/// Default HTTP bind port
pub const DEFAULT_PORT: u16 = 5741;

const DEFAULT_ANALYSIS_BASE_URL: &str = "http://127.0.0.1:9931";

/// Deadline for the synchronous analysis attempt during ingestion
const DEFAULT_INLINE_DEADLINE: Duration = Duration::from_secs(5);

/// Deadline for retry-worker attempts
const DEFAULT_WORKER_DEADLINE: Duration = Duration::from_secs(30);

/// Service configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub port: u16,
    pub analysis_base_url: String,
    pub analysis_api_key: Option<String>,
    pub inline_deadline: Duration,
    pub worker_deadline: Duration,
    pub worker: WorkerConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            analysis_base_url: DEFAULT_ANALYSIS_BASE_URL.to_string(),
            analysis_api_key: None,
            inline_deadline: DEFAULT_INLINE_DEADLINE,
            worker_deadline: DEFAULT_WORKER_DEADLINE,
            worker: WorkerConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Defaults overridden by TOML, then by environment variables.
    /// The API key is resolved separately (see [`resolve_analysis_api_key`]).
    pub fn from_sources(toml_config: &TomlConfig) -> Self {
        let mut config = Self::default();

        if let Some(url) = &toml_config.analysis_base_url {
            config.analysis_base_url = url.clone();
        }
        if let Some(port) = toml_config.port {
            config.port = port;
        }

        if let Ok(url) = std::env::var("VITALWATCH_ANALYSIS_URL") {
            if !url.trim().is_empty() {
                config.analysis_base_url = url;
            }
        }
        if let Ok(raw) = std::env::var("VITALWATCH_PORT") {
            match raw.parse::<u16>() {
                Ok(port) => config.port = port,
                Err(_) => warn!(raw = %raw, "Ignoring invalid VITALWATCH_PORT"),
            }
        }

        config
    }
}

/// Resolve the analysis service API key from 3-tier configuration
///
/// **Priority:** Database → ENV → TOML
///
/// The key is optional; a service deployed without authentication runs with
/// none. When multiple sources carry a key the highest-priority one wins and
/// a warning flags the potential misconfiguration.
pub async fn resolve_analysis_api_key(
    db: &SqlitePool,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let mut sources = Vec::new();

    // Tier 1: Database (authoritative)
    let db_key = crate::db::settings::get_analysis_api_key(db).await?;
    if db_key.as_deref().is_some_and(is_valid_key) {
        sources.push("database");
    }

    // Tier 2: Environment variable
    let env_key = std::env::var("VITALWATCH_ANALYSIS_API_KEY").ok();
    if env_key.as_deref().is_some_and(is_valid_key) {
        sources.push("environment");
    }

    // Tier 3: TOML config
    let toml_key = toml_config.analysis_api_key.clone();
    if toml_key.as_deref().is_some_and(is_valid_key) {
        sources.push("TOML");
    }

    if sources.len() > 1 {
        warn!(
            "Analysis API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    for (key, source) in [(db_key, "database"), (env_key, "environment"), (toml_key, "TOML")] {
        if let Some(key) = key {
            if is_valid_key(&key) {
                info!("Analysis API key loaded from {}", source);
                return Ok(Some(key));
            }
        }
    }

    info!("No analysis API key configured; requests will be unauthenticated");
    Ok(None)
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.inline_deadline, Duration::from_secs(5));
        assert_eq!(config.worker_deadline, Duration::from_secs(30));
        assert_eq!(config.worker.batch_size, 3);
        assert_eq!(config.worker.period, Duration::from_secs(30));
    }

    #[test]
    fn test_toml_overrides() {
        let toml_config = TomlConfig {
            root_folder: None,
            analysis_base_url: Some("http://analysis.internal:8080".to_string()),
            analysis_api_key: None,
            port: Some(6000),
        };
        let config = MonitorConfig::from_sources(&toml_config);
        assert_eq!(config.analysis_base_url, "http://analysis.internal:8080");
        assert_eq!(config.port, 6000);
    }

    #[test]
    fn test_key_validation() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }

    #[tokio::test]
    async fn test_api_key_database_tier_wins() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        crate::db::settings::set_analysis_api_key(&pool, "db-key")
            .await
            .unwrap();

        let toml_config = TomlConfig {
            analysis_api_key: Some("toml-key".to_string()),
            ..TomlConfig::default()
        };

        let key = resolve_analysis_api_key(&pool, &toml_config).await.unwrap();
        assert_eq!(key.as_deref(), Some("db-key"));
    }

    #[tokio::test]
    async fn test_api_key_absent_everywhere_is_none() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();

        let key = resolve_analysis_api_key(&pool, &TomlConfig::default())
            .await
            .unwrap();
        assert!(key.is_none());
    }
}
