//! Data models for vitalwatch-monitor

pub mod analysis;
pub mod enhanced;
pub mod player;
pub mod reading;
pub mod retry;

pub use analysis::{Analysis, AnalysisResult, FallbackReason, RiskLevel};
pub use enhanced::{EnhancedAnalysis, PerformanceImpact};
pub use player::{Player, PlayerInfo};
pub use reading::{HealthReading, NormalRanges, Severity, VitalMetrics};
pub use retry::{RetryJob, RetryQueueStats, RetryStatus};
