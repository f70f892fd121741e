use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Completed,
    OnHold,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::OnHold => "on_hold",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "not_started" => Some(TaskStatus::NotStarted),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            "on_hold" => Some(TaskStatus::OnHold),
            _ => None,
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::NotStarted
    }
}

/// A schedule task. Dates are calendar dates with no time component and
/// `duration_days` is kept equal to `end_date - start_date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub schedule_id: i64,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_days: i64,
    pub percent_complete: f64,
    pub status: TaskStatus,
    pub parent_id: Option<i64>,
    pub sort_order: i64,
    pub contractor_id: Option<i64>,
    pub budget_category_id: Option<i64>,
    pub is_milestone: bool,
}

impl Task {
    pub fn new(
        id: i64,
        schedule_id: i64,
        name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            schedule_id,
            name: name.into(),
            start_date,
            end_date,
            duration_days: (end_date - start_date).num_days(),
            percent_complete: 0.0,
            status: TaskStatus::NotStarted,
            parent_id: None,
            sort_order: 0,
            contractor_id: None,
            budget_category_id: None,
            is_milestone: false,
        }
    }

    /// A milestone: zero duration, start == end.
    pub fn milestone(id: i64, schedule_id: i64, name: impl Into<String>, date: NaiveDate) -> Self {
        let mut task = Self::new(id, schedule_id, name, date, date);
        task.is_milestone = true;
        task
    }

    /// Replace both dates, keeping `duration_days` consistent.
    pub fn set_dates(&mut self, start_date: NaiveDate, end_date: NaiveDate) {
        self.start_date = start_date;
        self.end_date = end_date;
        self.duration_days = (end_date - start_date).num_days();
    }

    pub fn dates_consistent(&self) -> bool {
        self.end_date >= self.start_date
            && self.duration_days == (self.end_date - self.start_date).num_days()
    }
}

/// Flat date update staged by a cascade run and consumed by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDateUpdate {
    pub task_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}
