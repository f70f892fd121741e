use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Draft,
    Active,
    Completed,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Draft => "draft",
            ScheduleStatus::Active => "active",
            ScheduleStatus::Completed => "completed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(ScheduleStatus::Draft),
            "active" => Some(ScheduleStatus::Active),
            "completed" => Some(ScheduleStatus::Completed),
            _ => None,
        }
    }
}

impl Default for ScheduleStatus {
    fn default() -> Self {
        ScheduleStatus::Draft
    }
}

/// Groups the tasks of one project. The cascade only uses it as a scoping key;
/// its own dates and status are never touched by propagation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: i64,
    pub project_name: String,
    pub start_date: NaiveDate,
    pub target_end_date: NaiveDate,
    pub actual_end_date: Option<NaiveDate>,
    pub status: ScheduleStatus,
}

impl Schedule {
    pub fn new(
        id: i64,
        project_name: impl Into<String>,
        start_date: NaiveDate,
        target_end_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            project_name: project_name.into(),
            start_date,
            target_end_date,
            actual_end_date: None,
            status: ScheduleStatus::Draft,
        }
    }
}
