//! Production task models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ProductId;

/// Lifecycle of a production task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Planned,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Planned => "planned",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(TaskStatus::Planned),
            "completed" => Some(TaskStatus::Completed),
            "cancelled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }

    /// Only planned tasks may move; completed and cancelled are terminal
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Planned, TaskStatus::Completed) | (TaskStatus::Planned, TaskStatus::Cancelled)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A request to produce a number of pieces of one product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionTask {
    pub id: Uuid,
    pub product_id: ProductId,
    pub planned_piece_count: u32,
    pub production_date: NaiveDate,
    pub status: TaskStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_transitions() {
        assert!(TaskStatus::Planned.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Planned.can_transition_to(TaskStatus::Cancelled));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Cancelled));
        assert!(!TaskStatus::Cancelled.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Planned.can_transition_to(TaskStatus::Planned));
    }

    #[test]
    fn test_status_round_trip_strings() {
        for status in [TaskStatus::Planned, TaskStatus::Completed, TaskStatus::Cancelled] {
            assert_eq!(TaskStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::from_str("baking"), None);
    }
}
