//! Locally generated fallback analyses
//!
//! Deterministic, dependency-free analysis generation used when the external
//! service is unavailable, still pending, or simply not consulted (non-alert
//! readings). Never fails, never performs I/O. Results are tagged as
//! fallbacks by the callers, which know the reason.

use crate::models::{Analysis, PlayerInfo, RiskLevel, Severity, VitalMetrics};

/// Basic analysis for normal and warning readings.
///
/// The external service is not consulted for these; the assessment is a
/// monitoring recommendation derived from which warning bands were breached.
pub fn basic_analysis(metrics: &VitalMetrics, state: Severity, player: &PlayerInfo) -> Analysis {
    let normal = state == Severity::Normal;

    Analysis {
        summary: if normal {
            format!("{}'s health readings are within normal ranges.", player.name)
        } else {
            format!(
                "{}'s health readings show some values outside normal ranges that require monitoring.",
                player.name
            )
        },
        recommendations: if normal {
            vec![
                "Continue regular monitoring".to_string(),
                "Maintain current training regimen".to_string(),
                "Ensure proper hydration and nutrition".to_string(),
            ]
        } else {
            vec![
                "Monitor the player's condition more frequently".to_string(),
                "Consider adjusting training intensity".to_string(),
                "Ensure proper hydration and rest".to_string(),
            ]
        },
        risk_level: if normal { RiskLevel::Low } else { RiskLevel::Medium },
        potential_issues: warning_band_issues(metrics),
        replacement_needed: false,
        recovery_time_estimate: None,
        priority_action: if normal {
            "Continue normal monitoring protocols".to_string()
        } else {
            "Monitor player closely and consider adjustments to training load".to_string()
        },
    }
}

/// Detailed fallback for alert readings.
///
/// Produced when the external service errors or has not answered yet.
/// Issues name the specific alert-band breaches; a position-specific caveat
/// is always appended.
pub fn alert_fallback(metrics: &VitalMetrics, player: &PlayerInfo) -> Analysis {
    let mut potential_issues = alert_band_issues(metrics);

    // An alert reading with no single metric in its alert band still gets a
    // concrete issue entry
    if potential_issues.is_empty() {
        potential_issues.push("Critical health concern detected in combined metrics".to_string());
    }

    potential_issues.push(position_caveat(&player.position));

    Analysis {
        summary: format!(
            "PRELIMINARY ANALYSIS: {}'s health readings indicate a critical alert state requiring \
             immediate attention. This analysis is based on limited data and should be \
             supplemented with medical evaluation.",
            player.name
        ),
        recommendations: vec![
            "Remove player from field immediately for medical assessment".to_string(),
            "Monitor vital signs continuously".to_string(),
            "Begin standard recovery protocols appropriate for position".to_string(),
            "Prepare substitute player".to_string(),
            "Document all symptoms and readings for medical staff".to_string(),
        ],
        risk_level: RiskLevel::High,
        potential_issues,
        replacement_needed: true,
        recovery_time_estimate: Some("To be determined after medical assessment".to_string()),
        priority_action: "Immediate removal from play and medical evaluation".to_string(),
    }
}

/// Issues for metrics outside their warning band
fn warning_band_issues(metrics: &VitalMetrics) -> Vec<String> {
    let mut issues = Vec::new();

    if metrics.temperature < 36.5 || metrics.temperature > 37.5 {
        issues.push("Abnormal body temperature".to_string());
    }
    if metrics.heart_rate < 60.0 || metrics.heart_rate > 100.0 {
        issues.push("Irregular heart rate".to_string());
    }
    if metrics.blood_oxygen < 95.0 {
        issues.push("Low blood oxygen levels".to_string());
    }
    if metrics.hydration < 70.0 {
        issues.push("Dehydration".to_string());
    }
    if metrics.respiration < 12.0 || metrics.respiration > 20.0 {
        issues.push("Abnormal respiration rate".to_string());
    }
    if metrics.fatigue > 30.0 {
        issues.push("Excessive fatigue".to_string());
    }

    issues
}

/// Issues for metrics inside their alert band, with clinical naming
fn alert_band_issues(metrics: &VitalMetrics) -> Vec<String> {
    let mut issues = Vec::new();

    if metrics.temperature < 36.0 {
        issues.push("Hypothermia risk: Body temperature below safe threshold".to_string());
    } else if metrics.temperature > 38.0 {
        issues.push("Hyperthermia risk: Body temperature above safe threshold".to_string());
    }

    if metrics.heart_rate < 50.0 {
        issues.push("Bradycardia: Abnormally low heart rate".to_string());
    } else if metrics.heart_rate > 120.0 {
        issues.push("Tachycardia: Abnormally elevated heart rate".to_string());
    }

    if metrics.blood_oxygen < 90.0 {
        issues.push("Hypoxemia: Critically low blood oxygen levels".to_string());
    }

    if metrics.hydration < 60.0 {
        issues.push("Severe dehydration: Urgent rehydration needed".to_string());
    }

    if metrics.respiration < 10.0 {
        issues.push("Respiratory depression: Abnormally slow breathing rate".to_string());
    } else if metrics.respiration > 25.0 {
        issues.push("Hyperventilation: Abnormally rapid breathing rate".to_string());
    }

    if metrics.fatigue > 50.0 {
        issues.push("Extreme fatigue: High risk of injury and performance impairment".to_string());
    }

    issues
}

/// Position-specific caveat appended to every alert fallback
fn position_caveat(position: &str) -> String {
    match position.to_lowercase().as_str() {
        "goalkeeper" => "Alert state may affect reaction time and decision making".to_string(),
        "defender" => {
            "Alert state may compromise defensive positioning and tackling safety".to_string()
        }
        "midfielder" => {
            "Alert state may impact stamina and field coverage capabilities".to_string()
        }
        "forward" => "Alert state may affect sprint capacity and finishing ability".to_string(),
        _ => "Alert state may compromise overall performance and safety".to_string(),
    }
}
