//! Retry queue models
//!
//! A [`RetryJob`] is one outstanding obligation to (re)obtain an analysis for
//! a specific reading. At most one job per reading is active (pending or
//! processing) at any time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Retry job lifecycle state
///
/// ```text
/// (none) --enqueue--> pending --mark_processing--> processing
/// processing --success--> completed                      (terminal)
/// processing --failure below ceiling--> pending          (rescheduled)
/// processing --failure at ceiling--> failed              (terminal)
/// failed/completed --operator reset--> pending
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RetryStatus {
    /// Database column representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryStatus::Pending => "pending",
            RetryStatus::Processing => "processing",
            RetryStatus::Completed => "completed",
            RetryStatus::Failed => "failed",
        }
    }

    /// Parse the database column representation
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(RetryStatus::Pending),
            "processing" => Some(RetryStatus::Processing),
            "completed" => Some(RetryStatus::Completed),
            "failed" => Some(RetryStatus::Failed),
            _ => None,
        }
    }
}

/// One row of the analysis retry queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryJob {
    pub id: i64,
    pub reading_id: Uuid,
    pub player_id: Uuid,
    pub attempts: u32,
    pub max_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub status: RetryStatus,
    /// Only meaningful while `status` is pending
    pub next_retry_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-status job counts for the admin dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryQueueStats {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_db_round_trip() {
        for status in [
            RetryStatus::Pending,
            RetryStatus::Processing,
            RetryStatus::Completed,
            RetryStatus::Failed,
        ] {
            assert_eq!(RetryStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RetryStatus::parse("unknown"), None);
    }
}
