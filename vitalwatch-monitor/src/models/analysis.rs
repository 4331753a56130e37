//! Structured analysis result types
//!
//! An [`AnalysisResult`] is always tagged with its provenance: either the
//! external analysis service produced it (`verified`), or it was generated
//! locally (`fallback`, with a machine-readable reason). Callers can never
//! mistake a provisional result for a verified one.

use serde::{Deserialize, Serialize};

/// Risk level assigned by an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Structured clinical-style analysis of one reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Brief summary of the player's health status
    pub summary: String,
    /// Ranked, actionable recommendations
    pub recommendations: Vec<String>,
    pub risk_level: RiskLevel,
    /// Issues detected in the reading
    pub potential_issues: Vec<String>,
    /// Whether the player should be substituted
    pub replacement_needed: bool,
    /// Estimated recovery time, when issues were detected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_time_estimate: Option<String>,
    /// The single most important action to take immediately
    pub priority_action: String,
}

/// Why a result was generated locally instead of by the analysis service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The external service errored or returned an unusable response
    ServiceError,
    /// The external call did not settle within the deadline
    TimedOut,
    /// Non-alert reading; the external service is not consulted for these
    NotRequested,
}

/// Analysis outcome, tagged by provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum AnalysisResult {
    /// Produced by the external analysis service
    Verified {
        #[serde(flatten)]
        analysis: Analysis,
    },
    /// Generated locally; `reason` says why
    Fallback {
        #[serde(flatten)]
        analysis: Analysis,
        reason: FallbackReason,
    },
}

impl AnalysisResult {
    pub fn analysis(&self) -> &Analysis {
        match self {
            AnalysisResult::Verified { analysis } => analysis,
            AnalysisResult::Fallback { analysis, .. } => analysis,
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, AnalysisResult::Verified { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_analysis() -> Analysis {
        Analysis {
            summary: "Readings within normal ranges.".to_string(),
            recommendations: vec!["Continue regular monitoring".to_string()],
            risk_level: RiskLevel::Low,
            potential_issues: vec![],
            replacement_needed: false,
            recovery_time_estimate: None,
            priority_action: "Continue normal monitoring protocols".to_string(),
        }
    }

    #[test]
    fn test_result_serializes_with_source_tag() {
        let verified = AnalysisResult::Verified {
            analysis: sample_analysis(),
        };
        let json = serde_json::to_value(&verified).unwrap();
        assert_eq!(json["source"], "verified");
        assert_eq!(json["risk_level"], "low");
        assert!(json.get("reason").is_none());

        let fallback = AnalysisResult::Fallback {
            analysis: sample_analysis(),
            reason: FallbackReason::TimedOut,
        };
        let json = serde_json::to_value(&fallback).unwrap();
        assert_eq!(json["source"], "fallback");
        assert_eq!(json["reason"], "timed_out");
    }

    #[test]
    fn test_result_deserializes_by_tag() {
        let raw = serde_json::json!({
            "source": "fallback",
            "reason": "service_error",
            "summary": "Critical alert state.",
            "recommendations": ["Seek immediate medical evaluation"],
            "risk_level": "high",
            "potential_issues": ["Hypoxemia: Critically low blood oxygen levels"],
            "replacement_needed": true,
            "priority_action": "Immediate removal from play"
        });
        let result: AnalysisResult = serde_json::from_value(raw).unwrap();
        assert!(!result.is_verified());
        assert_eq!(result.analysis().risk_level, RiskLevel::High);
    }
}
