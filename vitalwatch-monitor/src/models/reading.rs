//! Vital-sign reading model and severity classification
//!
//! Each reading carries six numeric metrics. Severity is derived once at
//! ingestion from two nested threshold bands per metric and is immutable
//! afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::AnalysisResult;

// Warning band boundaries (outside-normal)
const TEMPERATURE_WARN_LOW: f64 = 36.5;
const TEMPERATURE_WARN_HIGH: f64 = 37.5;
const HEART_RATE_WARN_LOW: f64 = 60.0;
const HEART_RATE_WARN_HIGH: f64 = 100.0;
const BLOOD_OXYGEN_WARN_LOW: f64 = 95.0;
const HYDRATION_WARN_LOW: f64 = 70.0;
const RESPIRATION_WARN_LOW: f64 = 12.0;
const RESPIRATION_WARN_HIGH: f64 = 20.0;
const FATIGUE_WARN_HIGH: f64 = 30.0;

// Alert band boundaries (wider than the warning band)
const TEMPERATURE_ALERT_LOW: f64 = 36.0;
const TEMPERATURE_ALERT_HIGH: f64 = 38.0;
const HEART_RATE_ALERT_LOW: f64 = 50.0;
const HEART_RATE_ALERT_HIGH: f64 = 120.0;
const BLOOD_OXYGEN_ALERT_LOW: f64 = 90.0;
const HYDRATION_ALERT_LOW: f64 = 60.0;
const RESPIRATION_ALERT_LOW: f64 = 10.0;
const RESPIRATION_ALERT_HIGH: f64 = 25.0;
const FATIGUE_ALERT_HIGH: f64 = 50.0;

/// One sampled set of vital-sign metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VitalMetrics {
    /// Body temperature in °C
    pub temperature: f64,
    /// Heart rate in beats per minute
    pub heart_rate: f64,
    /// Blood oxygen saturation in percent
    pub blood_oxygen: f64,
    /// Hydration level in percent
    pub hydration: f64,
    /// Respiration rate in breaths per minute
    pub respiration: f64,
    /// Fatigue on a 0-100 scale (lower is better)
    pub fatigue: f64,
}

impl VitalMetrics {
    /// Classify metrics into a severity state.
    ///
    /// The alert band is checked first: a single metric in its alert band
    /// makes the whole reading an alert, even if every other metric is
    /// normal. Otherwise any warning-band breach yields a warning.
    pub fn classify(&self) -> Severity {
        if self.breaches_alert_band() {
            Severity::Alert
        } else if self.breaches_warning_band() {
            Severity::Warning
        } else {
            Severity::Normal
        }
    }

    fn breaches_alert_band(&self) -> bool {
        self.temperature < TEMPERATURE_ALERT_LOW
            || self.temperature > TEMPERATURE_ALERT_HIGH
            || self.heart_rate < HEART_RATE_ALERT_LOW
            || self.heart_rate > HEART_RATE_ALERT_HIGH
            || self.blood_oxygen < BLOOD_OXYGEN_ALERT_LOW
            || self.hydration < HYDRATION_ALERT_LOW
            || self.respiration < RESPIRATION_ALERT_LOW
            || self.respiration > RESPIRATION_ALERT_HIGH
            || self.fatigue > FATIGUE_ALERT_HIGH
    }

    fn breaches_warning_band(&self) -> bool {
        self.temperature < TEMPERATURE_WARN_LOW
            || self.temperature > TEMPERATURE_WARN_HIGH
            || self.heart_rate < HEART_RATE_WARN_LOW
            || self.heart_rate > HEART_RATE_WARN_HIGH
            || self.blood_oxygen < BLOOD_OXYGEN_WARN_LOW
            || self.hydration < HYDRATION_WARN_LOW
            || self.respiration < RESPIRATION_WARN_LOW
            || self.respiration > RESPIRATION_WARN_HIGH
            || self.fatigue > FATIGUE_WARN_HIGH
    }

    /// All values are finite numbers (NaN and infinities are rejected at the
    /// API boundary before a reading is ever constructed)
    pub fn is_finite(&self) -> bool {
        self.temperature.is_finite()
            && self.heart_rate.is_finite()
            && self.blood_oxygen.is_finite()
            && self.hydration.is_finite()
            && self.respiration.is_finite()
            && self.fatigue.is_finite()
    }
}

/// Normal ranges sent to the analysis service as context
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NormalRanges {
    pub temperature: (f64, f64),
    pub heart_rate: (f64, f64),
    pub blood_oxygen: (f64, f64),
    pub hydration: (f64, f64),
    pub respiration: (f64, f64),
    pub fatigue: (f64, f64),
}

impl Default for NormalRanges {
    fn default() -> Self {
        Self {
            temperature: (TEMPERATURE_WARN_LOW, TEMPERATURE_WARN_HIGH),
            heart_rate: (HEART_RATE_WARN_LOW, HEART_RATE_WARN_HIGH),
            blood_oxygen: (BLOOD_OXYGEN_WARN_LOW, 100.0),
            hydration: (HYDRATION_WARN_LOW, 100.0),
            respiration: (RESPIRATION_WARN_LOW, RESPIRATION_WARN_HIGH),
            fatigue: (0.0, FATIGUE_WARN_HIGH),
        }
    }
}

/// Severity classification of a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
    Alert,
}

impl Severity {
    /// Database column representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Warning => "warning",
            Severity::Alert => "alert",
        }
    }

    /// Parse the database column representation
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "normal" => Some(Severity::Normal),
            "warning" => Some(Severity::Warning),
            "alert" => Some(Severity::Alert),
            _ => None,
        }
    }
}

/// One persisted vital-sign reading for a monitored player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReading {
    pub id: Uuid,
    pub player_id: Uuid,
    #[serde(flatten)]
    pub metrics: VitalMetrics,
    /// Severity derived at ingestion, immutable afterwards
    pub state: Severity,
    /// Structured analysis, absent until the inline path or the retry worker
    /// writes one; a later successful retry may overwrite it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl HealthReading {
    /// Build a new reading; severity is classified here, once.
    pub fn new(player_id: Uuid, metrics: VitalMetrics, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            player_id,
            metrics,
            state: metrics.classify(),
            analysis: None,
            recorded_at,
            created_at: vitalwatch_common::time::now(),
        }
    }
}
