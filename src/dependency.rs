use serde::{Deserialize, Serialize};

/// The four standard scheduling relationship types. Each anchors a different
/// pair of predecessor/successor date points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

impl DependencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::FinishToStart => "finish_to_start",
            DependencyType::StartToStart => "start_to_start",
            DependencyType::FinishToFinish => "finish_to_finish",
            DependencyType::StartToFinish => "start_to_finish",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "finish_to_start" => Some(DependencyType::FinishToStart),
            "start_to_start" => Some(DependencyType::StartToStart),
            "finish_to_finish" => Some(DependencyType::FinishToFinish),
            "start_to_finish" => Some(DependencyType::StartToFinish),
            _ => None,
        }
    }
}

impl Default for DependencyType {
    fn default() -> Self {
        DependencyType::FinishToStart
    }
}

/// A directed edge: predecessor task -> successor task, with a signed lag in
/// calendar days (negative lag expresses lead time).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: i64,
    pub schedule_id: i64,
    pub predecessor_id: i64,
    pub successor_id: i64,
    pub kind: DependencyType,
    pub lag_days: i64,
}

impl Dependency {
    pub fn new(
        id: i64,
        schedule_id: i64,
        predecessor_id: i64,
        successor_id: i64,
        kind: DependencyType,
        lag_days: i64,
    ) -> Self {
        Self {
            id,
            schedule_id,
            predecessor_id,
            successor_id,
            kind,
            lag_days,
        }
    }
}
