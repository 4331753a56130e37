//! Player (monitored subject) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A monitored player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub position: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jersey_number: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The subset of player data the analysis paths need
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub name: String,
    pub position: String,
}

impl PlayerInfo {
    /// Placeholder used when the player lookup fails; a missing player row
    /// must never abort an analysis or a retry.
    pub fn placeholder() -> Self {
        Self {
            name: "Unknown Player".to_string(),
            position: "Unknown Position".to_string(),
        }
    }
}
