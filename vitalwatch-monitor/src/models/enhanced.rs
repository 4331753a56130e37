//! Enhanced analysis result types
//!
//! A richer, history-aware assessment produced for alert readings on demand.
//! Unlike [`super::AnalysisResult`] this is not persisted onto the reading;
//! it is returned to the caller directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Estimated performance impact percentages (0-100)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceImpact {
    /// Remaining capacity; higher is better
    pub current_capacity: f64,
    /// Higher means greater negative impact
    pub endurance_impact: f64,
    pub speed_impact: f64,
    pub decision_making_impact: f64,
    /// Position-specific performance metrics
    pub position_specific_metrics: BTreeMap<String, f64>,
}

/// History-aware analysis of an alert reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedAnalysis {
    pub summary: String,
    pub key_findings: Vec<String>,
    /// How the metrics evolved over the analyzed readings
    pub trend_analysis: String,
    pub recommendations: Vec<String>,
    pub estimated_recovery: String,
    pub performance_impact: PerformanceImpact,
    pub primary_limiting_factors: Vec<String>,
    pub secondary_concerns: Vec<String>,
    pub recovery_optimization: Vec<String>,
    pub training_adjustments: Vec<String>,
    pub nutrition_recommendations: Vec<String>,
    /// Confidence in the assessment, 0-100
    pub confidence_level: f64,
    /// Number of historical readings that informed the assessment
    pub readings_analyzed: usize,
    pub generated_at: DateTime<Utc>,
}
