use crate::dependency::Dependency;
use crate::schedule::Schedule;
use crate::task::{Task, TaskDateUpdate};
use chrono::NaiveDate;
use serde_json::Error as SerdeJsonError;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum PersistenceError {
    Serialization(SerdeJsonError),
    Io(io::Error),
    #[cfg(feature = "sqlite")]
    Sqlite(rusqlite::Error),
    Csv(csv::Error),
    InvalidData(String),
    NotFound,
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Serialization(err) => write!(f, "serialization error: {err}"),
            PersistenceError::Io(err) => write!(f, "io error: {err}"),
            #[cfg(feature = "sqlite")]
            PersistenceError::Sqlite(err) => write!(f, "sqlite error: {err}"),
            PersistenceError::Csv(err) => write!(f, "csv error: {err}"),
            PersistenceError::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            PersistenceError::NotFound => write!(f, "record not found"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<SerdeJsonError> for PersistenceError {
    fn from(value: SerdeJsonError) -> Self {
        Self::Serialization(value)
    }
}

impl From<io::Error> for PersistenceError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<csv::Error> for PersistenceError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Outcome of a batch date write. Partial failure is data, not an error: the
/// caller needs to know exactly which tasks are now out of step with their
/// dependencies.
#[derive(Debug, Default)]
pub struct BatchWriteReport {
    pub persisted: Vec<i64>,
    pub failed: Vec<(i64, PersistenceError)>,
}

impl BatchWriteReport {
    pub fn all_persisted(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Data-access boundary of the cascade engine. Dependency fetches return flat
/// lists of typed edge records. Implementations must keep `duration_days`
/// consistent with the dates written by `update_task_dates`.
pub trait ScheduleStore {
    fn get_schedule(&self, schedule_id: i64) -> PersistenceResult<Option<Schedule>>;
    fn list_tasks(&self, schedule_id: i64) -> PersistenceResult<Vec<Task>>;
    fn get_task(&self, task_id: i64) -> PersistenceResult<Option<Task>>;
    fn list_dependencies(&self, schedule_id: i64) -> PersistenceResult<Vec<Dependency>>;
    fn update_task_dates(
        &self,
        task_id: i64,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> PersistenceResult<()>;

    /// Best-effort sequential fallback; stores with transactional batch
    /// support should override this.
    fn update_task_dates_batch(&self, updates: &[TaskDateUpdate]) -> BatchWriteReport {
        let mut report = BatchWriteReport::default();
        for update in updates {
            match self.update_task_dates(update.task_id, update.start_date, update.end_date) {
                Ok(()) => report.persisted.push(update.task_id),
                Err(err) => report.failed.push((update.task_id, err)),
            }
        }
        report
    }
}

const EPSILON: f64 = 1e-6;

pub fn validate_tasks(tasks: &[Task]) -> PersistenceResult<()> {
    let mut seen_ids = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !seen_ids.insert(task.id) {
            return Err(PersistenceError::InvalidData(format!(
                "duplicate task id {}",
                task.id
            )));
        }
        if task.duration_days < 0 {
            return Err(PersistenceError::InvalidData(format!(
                "task {} has negative duration {}",
                task.id, task.duration_days
            )));
        }
        if task.end_date < task.start_date {
            return Err(PersistenceError::InvalidData(format!(
                "task {} ends before it starts ({} < {})",
                task.id, task.end_date, task.start_date
            )));
        }
        if !task.dates_consistent() {
            return Err(PersistenceError::InvalidData(format!(
                "task {} duration {} does not match its dates {}..{}",
                task.id, task.duration_days, task.start_date, task.end_date
            )));
        }
        if !task.percent_complete.is_finite()
            || task.percent_complete < -EPSILON
            || task.percent_complete > 100.0 + EPSILON
        {
            return Err(PersistenceError::InvalidData(format!(
                "task {} has invalid percent_complete {} (must be between 0 and 100)",
                task.id, task.percent_complete
            )));
        }
        if task.is_milestone && task.duration_days != 0 {
            return Err(PersistenceError::InvalidData(format!(
                "milestone task {} must have zero duration (got {})",
                task.id, task.duration_days
            )));
        }
    }
    Ok(())
}

pub fn validate_dependencies(tasks: &[Task], dependencies: &[Dependency]) -> PersistenceResult<()> {
    let task_ids: HashSet<i64> = tasks.iter().map(|t| t.id).collect();
    let mut seen_ids = HashSet::with_capacity(dependencies.len());
    let mut seen_pairs: HashMap<(i64, i64), i64> = HashMap::with_capacity(dependencies.len());

    for edge in dependencies {
        if !seen_ids.insert(edge.id) {
            return Err(PersistenceError::InvalidData(format!(
                "duplicate dependency id {}",
                edge.id
            )));
        }
        if edge.predecessor_id == edge.successor_id {
            return Err(PersistenceError::InvalidData(format!(
                "dependency {} makes task {} depend on itself",
                edge.id, edge.predecessor_id
            )));
        }
        for endpoint in [edge.predecessor_id, edge.successor_id] {
            if !task_ids.contains(&endpoint) {
                return Err(PersistenceError::InvalidData(format!(
                    "dependency {} references unknown task {}",
                    edge.id, endpoint
                )));
            }
        }
        if seen_pairs
            .insert((edge.predecessor_id, edge.successor_id), edge.id)
            .is_some()
        {
            return Err(PersistenceError::InvalidData(format!(
                "duplicate dependency {} -> {}",
                edge.predecessor_id, edge.successor_id
            )));
        }
        if seen_pairs.contains_key(&(edge.successor_id, edge.predecessor_id)) {
            return Err(PersistenceError::InvalidData(format!(
                "reciprocal dependency between tasks {} and {}",
                edge.predecessor_id, edge.successor_id
            )));
        }
    }
    Ok(())
}

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    load_snapshot_from_json, load_tasks_from_csv, save_snapshot_to_json, save_tasks_to_csv,
    ScheduleSnapshot,
};
pub use memory::InMemoryScheduleStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteScheduleStore;
