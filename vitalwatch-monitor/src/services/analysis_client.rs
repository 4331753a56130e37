//! External analysis service client
//!
//! Thin HTTP client for the clinical analysis service. The caller's deadline
//! is propagated into each request, so an expired deadline cancels the call
//! itself rather than leaving it running after the caller has moved on.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::{
    Analysis, EnhancedAnalysis, NormalRanges, PlayerInfo, Severity, VitalMetrics,
};

const USER_AGENT: &str = concat!("VitalWatch/", env!("CARGO_PKG_VERSION"));

/// Default request timeout when the caller supplies no tighter deadline
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Analysis service client errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Analysis request timed out")]
    Timeout,

    #[error("Analysis rejected by service: {0}")]
    Rejected(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Analysis service not configured")]
    NotConfigured,
}

impl AnalysisError {
    /// Timeouts and network errors are the transient cases a retry is most
    /// likely to recover from; the distinction only matters for fallback
    /// tagging, every case is queued the same way.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AnalysisError::Timeout)
    }
}

/// Request payload for a single-reading analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub player: PlayerInfo,
    pub state: Severity,
    pub metrics: VitalMetrics,
    /// Normal-range context so the service needs no local configuration
    pub normal_ranges: NormalRanges,
}

/// One historical sample in an enhanced analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySample {
    pub recorded_at: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    pub metrics: VitalMetrics,
    pub state: Severity,
}

/// Request payload for a history-aware enhanced analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedAnalyzeRequest {
    pub player: PlayerInfo,
    pub current: HistorySample,
    pub history: Vec<HistorySample>,
    pub normal_ranges: NormalRanges,
}

/// Analysis service API client
pub struct AnalysisClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl AnalysisClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Result<Self, AnalysisError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| AnalysisError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Request a structured analysis for one reading, bounded by `deadline`.
    pub async fn analyze(
        &self,
        request: &AnalyzeRequest,
        deadline: Duration,
    ) -> Result<Analysis, AnalysisError> {
        let url = format!("{}/v1/analyze", self.base_url);
        let analysis: Analysis = self.post_json(&url, request, deadline).await?;

        if analysis.summary.trim().is_empty() {
            return Err(AnalysisError::ParseError("empty summary".to_string()));
        }

        tracing::debug!(
            player = %request.player.name,
            risk_level = ?analysis.risk_level,
            "Received analysis from service"
        );

        Ok(analysis)
    }

    /// Request a history-aware enhanced analysis, bounded by `deadline`.
    pub async fn analyze_enhanced(
        &self,
        request: &EnhancedAnalyzeRequest,
        deadline: Duration,
    ) -> Result<EnhancedAnalysis, AnalysisError> {
        let url = format!("{}/v1/analyze/enhanced", self.base_url);
        self.post_json(&url, request, deadline).await
    }

    async fn post_json<Req, Resp>(
        &self,
        url: &str,
        request: &Req,
        deadline: Duration,
    ) -> Result<Resp, AnalysisError>
    where
        Req: Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        let mut builder = self.http_client.post(url).timeout(deadline).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AnalysisError::Timeout
            } else {
                AnalysisError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status();

        if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            let detail = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Rejected(detail));
        }

        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AnalysisError::ApiError(status.as_u16(), detail));
        }

        response
            .json()
            .await
            .map_err(|e| AnalysisError::ParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = AnalysisClient::new("http://localhost:9090/".to_string(), None);
        assert!(client.is_ok());
        // Trailing slash is normalized away
        assert_eq!(client.unwrap().base_url, "http://localhost:9090");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_error() {
        // Nothing listens on this port; the connection is refused quickly
        let client =
            AnalysisClient::new("http://127.0.0.1:1".to_string(), None).unwrap();
        let request = AnalyzeRequest {
            player: PlayerInfo::placeholder(),
            state: Severity::Alert,
            metrics: VitalMetrics {
                temperature: 39.0,
                heart_rate: 130.0,
                blood_oxygen: 85.0,
                hydration: 50.0,
                respiration: 28.0,
                fatigue: 60.0,
            },
            normal_ranges: NormalRanges::default(),
        };

        let err = client
            .analyze(&request, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::NetworkError(_) | AnalysisError::Timeout
        ));
    }

    #[test]
    fn test_analyze_request_serializes_flat_metrics() {
        let request = AnalyzeRequest {
            player: PlayerInfo::placeholder(),
            state: Severity::Alert,
            metrics: VitalMetrics {
                temperature: 39.0,
                heart_rate: 130.0,
                blood_oxygen: 85.0,
                hydration: 50.0,
                respiration: 28.0,
                fatigue: 60.0,
            },
            normal_ranges: NormalRanges::default(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["state"], "alert");
        assert_eq!(json["metrics"]["temperature"], 39.0);
        assert_eq!(json["player"]["name"], "Unknown Player");
    }
}
