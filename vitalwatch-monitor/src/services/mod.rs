//! Service layer for vitalwatch-monitor

pub mod analysis_client;
pub mod analyzer;
pub mod enhanced;
pub mod fallback;

pub use analysis_client::{AnalysisClient, AnalysisError, AnalyzeRequest};
pub use analyzer::Analyzer;
