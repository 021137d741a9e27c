//! The renderable snapshot shared between the validation cycle and the display.

use chrono::{DateTime, Utc};

use crate::models::{UserStats, ValidationOutcome};

/// What the validation activity is doing right now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CycleStatus {
    #[default]
    Idle,
    RefreshingToken,
    Fetching,
    Error(String),
}

impl CycleStatus {
    pub fn label(&self) -> String {
        match self {
            CycleStatus::Idle => "Idle".to_string(),
            CycleStatus::RefreshingToken => "Refreshing token...".to_string(),
            CycleStatus::Fetching => "Fetching and validating...".to_string(),
            CycleStatus::Error(reason) => format!("Error: {}", reason),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CycleStatus::Error(_))
    }
}

/// Latest known state. Starts empty and is replaced as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayState {
    pub stats: Option<UserStats>,
    pub outcome: Option<ValidationOutcome>,
    pub status: CycleStatus,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub cycles_succeeded: u64,
    pub cycles_failed: u64,
}
