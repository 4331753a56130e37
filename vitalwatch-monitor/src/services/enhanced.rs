//! History-aware enhanced analysis
//!
//! Produces a richer assessment of an alert reading using the subject's
//! recent readings. With too little history a deterministic limited-data
//! variant is generated locally; on external failure a deterministic
//! fallback variant. Both carry a lower confidence level than a
//! service-produced assessment would.

use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::time::Duration;
use vitalwatch_common::time::now;
use vitalwatch_common::Result;

use crate::db;
use crate::models::{EnhancedAnalysis, HealthReading, NormalRanges, PerformanceImpact, PlayerInfo};
use crate::services::analysis_client::{
    AnalysisClient, EnhancedAnalyzeRequest, HistorySample,
};

/// How many historical readings inform an enhanced analysis
const HISTORY_LIMIT: u32 = 20;

/// Minimum history for a meaningful trend assessment
const MIN_HISTORY: usize = 2;

/// Confidence assigned to the limited-data variant
const LIMITED_DATA_CONFIDENCE: f64 = 70.0;

/// Confidence assigned to the failure-fallback variant
const FALLBACK_CONFIDENCE: f64 = 85.0;

/// Generate an enhanced analysis for one reading.
///
/// Database errors while loading history propagate; external-service errors
/// degrade to the local fallback variant.
pub async fn enhanced_analysis(
    pool: &SqlitePool,
    client: Option<&AnalysisClient>,
    reading: &HealthReading,
    player: &PlayerInfo,
    deadline: Duration,
) -> Result<EnhancedAnalysis> {
    let history = db::readings::recent_for_player(
        pool,
        reading.player_id,
        reading.recorded_at,
        HISTORY_LIMIT,
    )
    .await?;

    if history.len() < MIN_HISTORY {
        tracing::debug!(
            reading_id = %reading.id,
            history = history.len(),
            "Too little history for trend analysis, generating limited-data assessment"
        );
        return Ok(limited_data_analysis(player, reading, history.len()));
    }

    let Some(client) = client else {
        return Ok(fallback_enhanced(player, history.len()));
    };

    let request = EnhancedAnalyzeRequest {
        player: player.clone(),
        current: sample_from(reading),
        history: history.iter().map(sample_from).collect(),
        normal_ranges: NormalRanges::default(),
    };

    match client.analyze_enhanced(&request, deadline).await {
        Ok(analysis) => Ok(analysis),
        Err(err) => {
            tracing::warn!(
                reading_id = %reading.id,
                error = %err,
                "Enhanced analysis failed, generating fallback assessment"
            );
            Ok(fallback_enhanced(player, history.len()))
        }
    }
}

fn sample_from(reading: &HealthReading) -> HistorySample {
    HistorySample {
        recorded_at: reading.recorded_at,
        metrics: reading.metrics,
        state: reading.state,
    }
}

/// Metrics currently inside their alert band, with their values
fn alert_metric_descriptions(reading: &HealthReading) -> Vec<String> {
    let metrics = &reading.metrics;
    let mut described = Vec::new();

    if metrics.temperature < 36.0 || metrics.temperature > 38.0 {
        described.push(format!("Temperature: {}°C", metrics.temperature));
    }
    if metrics.heart_rate < 50.0 || metrics.heart_rate > 120.0 {
        described.push(format!("Heart Rate: {} BPM", metrics.heart_rate));
    }
    if metrics.blood_oxygen < 90.0 {
        described.push(format!("Blood Oxygen: {}%", metrics.blood_oxygen));
    }
    if metrics.hydration < 60.0 {
        described.push(format!("Hydration: {}%", metrics.hydration));
    }
    if metrics.respiration < 10.0 || metrics.respiration > 25.0 {
        described.push(format!("Respiration: {} breaths/min", metrics.respiration));
    }
    if metrics.fatigue > 50.0 {
        described.push(format!("Fatigue: {}/100", metrics.fatigue));
    }

    described
}

/// Position-keyed recommendation and performance metrics
fn position_profile(position: &str) -> (String, BTreeMap<String, f64>) {
    let mut metrics = BTreeMap::new();

    let recommendation = match position.to_lowercase().as_str() {
        "goalkeeper" => {
            metrics.insert("reaction_time".to_string(), 45.0);
            metrics.insert("decision_making".to_string(), 50.0);
            metrics.insert("explosive_movement".to_string(), 40.0);
            "Monitor reaction time and decision-making ability"
        }
        "defender" => {
            metrics.insert("defensive_positioning".to_string(), 40.0);
            metrics.insert("tackling_safety".to_string(), 35.0);
            metrics.insert("aerial_ability".to_string(), 45.0);
            "Assess defensive positioning and tackling capability"
        }
        "midfielder" => {
            metrics.insert("field_coverage".to_string(), 35.0);
            metrics.insert("passing_accuracy".to_string(), 50.0);
            metrics.insert("transition_speed".to_string(), 40.0);
            "Evaluate stamina and field coverage capacity"
        }
        "forward" => {
            metrics.insert("sprint_capacity".to_string(), 30.0);
            metrics.insert("finishing_precision".to_string(), 45.0);
            metrics.insert("off_ball_movement".to_string(), 40.0);
            "Check sprint capacity and finishing ability"
        }
        _ => {
            metrics.insert("overall_performance".to_string(), 40.0);
            "Assess position-specific performance metrics"
        }
    };

    (recommendation.to_string(), metrics)
}

/// Deterministic assessment when too little history exists for trends
pub fn limited_data_analysis(
    player: &PlayerInfo,
    reading: &HealthReading,
    history_len: usize,
) -> EnhancedAnalysis {
    let alert_metrics = alert_metric_descriptions(reading);
    let (position_recommendation, position_metrics) = position_profile(&player.position);

    let mut key_findings =
        vec!["Limited historical data available for comprehensive analysis".to_string()];
    key_findings.extend(
        alert_metrics
            .iter()
            .map(|metric| format!("Alert level detected in {}", metric)),
    );

    // Each alert-band breach degrades the estimated capacities a step further
    let breach_penalty = alert_metrics.len() as f64 * 5.0;
    let performance_impact = PerformanceImpact {
        current_capacity: (50.0 - breach_penalty).max(0.0),
        endurance_impact: (50.0 + breach_penalty).min(100.0),
        speed_impact: (45.0 + breach_penalty).min(100.0),
        decision_making_impact: (40.0 + breach_penalty).min(100.0),
        position_specific_metrics: position_metrics,
    };

    let reading_word = if history_len == 1 { "reading" } else { "readings" };

    EnhancedAnalysis {
        summary: format!(
            "PRELIMINARY ANALYSIS: {} is showing critical health metrics that require immediate \
             attention. This analysis is based on limited data ({} {}) and should be supplemented \
             with medical evaluation.",
            player.name, history_len, reading_word
        ),
        key_findings,
        trend_analysis: "Insufficient data for trend analysis. Continue monitoring to establish \
                         trends and patterns in vital signs."
            .to_string(),
        recommendations: vec![
            "Remove player from field for immediate medical assessment".to_string(),
            "Increase monitoring frequency to establish trends".to_string(),
            "Document all symptoms and observations".to_string(),
            position_recommendation,
            "Prepare substitute player as precautionary measure".to_string(),
        ],
        estimated_recovery: "Cannot be accurately determined with current data. Medical \
                             evaluation required for proper assessment."
            .to_string(),
        performance_impact,
        primary_limiting_factors: vec![
            "Acute physiological stress".to_string(),
            "Insufficient recovery data".to_string(),
            alert_metrics
                .first()
                .cloned()
                .unwrap_or_else(|| "Unknown primary factor".to_string()),
        ],
        secondary_concerns: vec![
            "Potential for rapid deterioration without intervention".to_string(),
            "Risk of injury due to compromised physical state".to_string(),
            "Incomplete performance baseline data".to_string(),
        ],
        recovery_optimization: vec![
            "Immediate medical evaluation".to_string(),
            "Establish baseline recovery metrics".to_string(),
            "Implement position-specific recovery protocols".to_string(),
        ],
        training_adjustments: vec![
            "Pause high-intensity training pending medical clearance".to_string(),
            "Consider modified training plan based on medical assessment".to_string(),
            "Implement gradual return-to-play protocol".to_string(),
        ],
        nutrition_recommendations: vec![
            "Immediate hydration with electrolyte replacement".to_string(),
            "Anti-inflammatory nutrition protocol".to_string(),
            "Targeted supplementation based on medical assessment".to_string(),
        ],
        confidence_level: LIMITED_DATA_CONFIDENCE,
        readings_analyzed: history_len,
        generated_at: now(),
    }
}

/// Deterministic assessment when the external service fails
pub fn fallback_enhanced(player: &PlayerInfo, readings_count: usize) -> EnhancedAnalysis {
    let mut position_metrics = BTreeMap::new();
    position_metrics.insert("field_coverage".to_string(), 35.0);
    position_metrics.insert("sprint_capacity".to_string(), 30.0);
    position_metrics.insert("reaction_time".to_string(), 50.0);

    EnhancedAnalysis {
        summary: format!(
            "{} is showing critical health metrics that require immediate attention. Multiple \
             vital signs are outside normal ranges, indicating potential health risks.",
            player.name
        ),
        key_findings: vec![
            "Multiple vital signs are in alert ranges".to_string(),
            "Possible signs of dehydration and fatigue".to_string(),
            "Vital signs trending in concerning direction".to_string(),
        ],
        trend_analysis: "The player's condition has deteriorated during this session, with vital \
                         signs progressively moving outside normal ranges."
            .to_string(),
        recommendations: vec![
            "Remove player from field immediately".to_string(),
            "Provide immediate medical evaluation".to_string(),
            "Begin hydration and cooling protocols".to_string(),
            "Monitor vital signs continuously".to_string(),
        ],
        estimated_recovery: "24-48 hours with proper medical intervention and rest. Player should \
                             not return to play until cleared by medical staff."
            .to_string(),
        performance_impact: PerformanceImpact {
            current_capacity: 40.0,
            endurance_impact: 75.0,
            speed_impact: 65.0,
            decision_making_impact: 60.0,
            position_specific_metrics: position_metrics,
        },
        primary_limiting_factors: vec![
            "Severe dehydration".to_string(),
            "Elevated core temperature".to_string(),
            "Cardiovascular strain".to_string(),
        ],
        secondary_concerns: vec![
            "Potential electrolyte imbalance".to_string(),
            "Risk of heat-related illness".to_string(),
            "Impaired cognitive function".to_string(),
        ],
        recovery_optimization: vec![
            "Immediate cooling and hydration protocols".to_string(),
            "Electrolyte replacement".to_string(),
            "Monitored rest in climate-controlled environment".to_string(),
        ],
        training_adjustments: vec![
            "Reduce training load for 48-72 hours".to_string(),
            "Focus on active recovery techniques".to_string(),
            "Gradual return to full intensity".to_string(),
        ],
        nutrition_recommendations: vec![
            "Increased fluid intake with electrolytes".to_string(),
            "Carbohydrate replenishment".to_string(),
            "Anti-inflammatory foods".to_string(),
        ],
        confidence_level: FALLBACK_CONFIDENCE,
        readings_analyzed: readings_count,
        generated_at: now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VitalMetrics;
    use uuid::Uuid;

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

    fn goalkeeper() -> PlayerInfo {
        PlayerInfo {
            name: "Sam Ortiz".to_string(),
            position: "Goalkeeper".to_string(),
        }
    }

    #[test]
    fn test_limited_data_counts_breaches() {
        let reading = alert_reading(Uuid::new_v4());
        let analysis = limited_data_analysis(&goalkeeper(), &reading, 1);

        assert_eq!(analysis.readings_analyzed, 1);
        assert_eq!(analysis.confidence_level, LIMITED_DATA_CONFIDENCE);
        // All six metrics are in their alert bands
        assert_eq!(analysis.key_findings.len(), 7);
        assert_eq!(analysis.performance_impact.current_capacity, 20.0);
        assert_eq!(analysis.performance_impact.endurance_impact, 80.0);
        assert!(analysis
            .performance_impact
            .position_specific_metrics
            .contains_key("reaction_time"));
        assert!(analysis.summary.contains("1 reading"));
    }

    #[test]
    fn test_limited_data_without_breaches_has_generic_factor() {
        let reading = HealthReading::new(
            Uuid::new_v4(),
            VitalMetrics {
                temperature: 36.8,
                heart_rate: 75.0,
                blood_oxygen: 98.0,
                hydration: 85.0,
                respiration: 16.0,
                fatigue: 15.0,
            },
            now(),
        );
        let analysis = limited_data_analysis(&goalkeeper(), &reading, 0);
        assert!(analysis
            .primary_limiting_factors
            .contains(&"Unknown primary factor".to_string()));
        assert_eq!(analysis.performance_impact.current_capacity, 50.0);
    }

    #[test]
    fn test_fallback_enhanced_shape() {
        let analysis = fallback_enhanced(&goalkeeper(), 7);
        assert_eq!(analysis.readings_analyzed, 7);
        assert_eq!(analysis.confidence_level, FALLBACK_CONFIDENCE);
        assert!(!analysis.recommendations.is_empty());
        assert!(analysis.summary.contains("Sam Ortiz"));
    }

    #[tokio::test]
    async fn test_enhanced_analysis_with_sparse_history_is_limited() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();

        let player_id = Uuid::new_v4();
        let reading = alert_reading(player_id);
        db::readings::insert_reading(&pool, &reading).await.unwrap();

        let analysis = enhanced_analysis(
            &pool,
            None,
            &reading,
            &goalkeeper(),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert_eq!(analysis.confidence_level, LIMITED_DATA_CONFIDENCE);
        assert_eq!(analysis.readings_analyzed, 0);
    }

    #[tokio::test]
    async fn test_enhanced_analysis_without_client_degrades_to_fallback() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();

        let player_id = Uuid::new_v4();
        // Two historical readings recorded before the current one
        for minutes_ago in [20i64, 10] {
            let mut earlier = alert_reading(player_id);
            earlier.recorded_at = now() - chrono::Duration::minutes(minutes_ago);
            db::readings::insert_reading(&pool, &earlier).await.unwrap();
        }
        let reading = alert_reading(player_id);
        db::readings::insert_reading(&pool, &reading).await.unwrap();

        let analysis = enhanced_analysis(
            &pool,
            None,
            &reading,
            &goalkeeper(),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert_eq!(analysis.confidence_level, FALLBACK_CONFIDENCE);
        assert_eq!(analysis.readings_analyzed, 2);
    }
}
