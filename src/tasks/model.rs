//! Task data model types.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    None,
    Daily,
    Weekly,
    Monthly,
}

impl Recurrence {
    pub fn as_str(self) -> &'static str {
        match self {
            Recurrence::None => "none",
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Recurrence::None),
            "daily" => Some(Recurrence::Daily),
            "weekly" => Some(Recurrence::Weekly),
            "monthly" => Some(Recurrence::Monthly),
            _ => None,
        }
    }

    /// Due date of the successor instance spawned when a recurring task is
    /// completed: one interval past `from`. Monthly recurrence shifts by one
    /// calendar month (Jan 31 → Feb 29/28, clamped).
    pub fn next_due(self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Recurrence::None => None,
            Recurrence::Daily => Some(from + Duration::days(1)),
            Recurrence::Weekly => Some(from + Duration::days(7)),
            Recurrence::Monthly => from.checked_add_months(Months::new(1)),
        }
    }
}

/// Request body for task creation.
#[derive(Debug, Deserialize)]
pub struct CreateTask {
    pub title: String,
    #[serde(default)]
    pub points: i64,
    /// "low" | "medium" | "high" (default: "medium").
    pub priority: Option<String>,
    /// "none" | "daily" | "weekly" | "monthly" (default: "none").
    pub recurrence: Option<String>,
    pub assigned_to: Option<String>,
    /// RFC 3339 timestamp.
    pub due_at: Option<String>,
}

/// Partial update for a task. Absent fields are untouched; `clear_assignee`
/// removes the assignment (distinct from not sending `assigned_to`).
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub points: Option<i64>,
    pub priority: Option<String>,
    pub recurrence: Option<String>,
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub clear_assignee: bool,
    pub due_at: Option<String>,
}
