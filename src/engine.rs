use crate::calculations::cascade::{CascadePass, PropagationError};
use crate::graph::DependencyGraph;
use crate::persistence::{PersistenceError, PersistenceResult, ScheduleStore};
use crate::task::{Task, TaskDateUpdate};
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug)]
pub enum CascadeError {
    DataAccess(PersistenceError),
    Propagation(PropagationError),
}

impl fmt::Display for CascadeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CascadeError::DataAccess(err) => write!(f, "data access failed: {err}"),
            CascadeError::Propagation(err) => write!(f, "propagation failed: {err}"),
        }
    }
}

impl std::error::Error for CascadeError {}

impl From<PersistenceError> for CascadeError {
    fn from(value: PersistenceError) -> Self {
        Self::DataAccess(value)
    }
}

impl From<PropagationError> for CascadeError {
    fn from(value: PropagationError) -> Self {
        Self::Propagation(value)
    }
}

/// What one cascade run did to the store.
#[derive(Debug, Default)]
pub struct CascadeOutcome {
    /// Updates that were persisted.
    pub updated: Vec<TaskDateUpdate>,
    /// Updates whose write failed; the remaining writes were still attempted.
    pub failed_writes: Vec<(i64, PersistenceError)>,
    /// Tasks dropped because their recomputed dates were invalid.
    pub skipped_invariant: Vec<i64>,
    /// Tasks expanded during propagation.
    pub processed: usize,
}

impl CascadeOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed_writes.is_empty() && self.skipped_invariant.is_empty()
    }

    pub fn updated_ids(&self) -> Vec<i64> {
        self.updated.iter().map(|u| u.task_id).collect()
    }
}

/// Result of a direct date edit plus its follow-on cascade. The edit itself
/// succeeded whenever this struct exists; the cascade's own success or failure
/// rides along so callers can surface it as a non-blocking warning.
#[derive(Debug)]
pub struct TaskEditOutcome {
    pub task_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub cascade: Result<CascadeOutcome, CascadeError>,
}

#[derive(Default)]
struct ScheduleLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ScheduleLocks {
    fn for_schedule(&self, schedule_id: i64) -> Arc<Mutex<()>> {
        Arc::clone(
            self.inner
                .lock()
                .entry(schedule_id)
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}

/// Drives a cascade against an injected store.
///
/// Two edits to the same schedule arriving concurrently would otherwise race:
/// each run computes successor dates from a snapshot taken at its start, and a
/// successor touched by both runs would keep whichever write landed last. Runs
/// are therefore serialized per schedule by a lock held for the whole run;
/// cascades over distinct schedules proceed independently.
pub struct CascadeEngine<S: ScheduleStore> {
    store: S,
    locks: ScheduleLocks,
}

impl<S: ScheduleStore> CascadeEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: ScheduleLocks::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run after a direct edit to a task's dates has been persisted. The new
    /// dates seed propagation even if the store snapshot is stale.
    pub fn cascade_from_task(
        &self,
        schedule_id: i64,
        task_id: i64,
        new_start: NaiveDate,
        new_end: NaiveDate,
    ) -> Result<CascadeOutcome, CascadeError> {
        let lock = self.locks.for_schedule(schedule_id);
        let _guard = lock.lock();
        self.run(schedule_id, task_id, Some((new_start, new_end)))
    }

    /// Run after a dependency edge's type or lag changed. The predecessor's
    /// dates did not move, so the seed is its stored dates.
    pub fn cascade_from_dependency(
        &self,
        schedule_id: i64,
        predecessor_id: i64,
    ) -> Result<CascadeOutcome, CascadeError> {
        let lock = self.locks.for_schedule(schedule_id);
        let _guard = lock.lock();
        self.run(schedule_id, predecessor_id, None)
    }

    /// Persist a direct date edit through the store's write path, then cascade
    /// from it. The outer `Result` is the edit; a cascade failure never rolls
    /// the edit back.
    pub fn apply_task_dates(
        &self,
        schedule_id: i64,
        task_id: i64,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> PersistenceResult<TaskEditOutcome> {
        let lock = self.locks.for_schedule(schedule_id);
        let _guard = lock.lock();

        self.store.update_task_dates(task_id, start_date, end_date)?;
        let cascade = self.run(schedule_id, task_id, Some((start_date, end_date)));
        Ok(TaskEditOutcome {
            task_id,
            start_date,
            end_date,
            cascade,
        })
    }

    fn run(
        &self,
        schedule_id: i64,
        seed_id: i64,
        seed_dates: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<CascadeOutcome, CascadeError> {
        // Fail-closed: any fetch error aborts before a single write.
        let tasks = self.store.list_tasks(schedule_id)?;
        let dependencies = self.store.list_dependencies(schedule_id)?;

        let task_index: HashMap<i64, Task> = tasks.into_iter().map(|t| (t.id, t)).collect();
        let graph = DependencyGraph::build(&dependencies);

        let (seed_start, seed_end) = match seed_dates {
            Some(dates) => dates,
            None => {
                let seed = task_index
                    .get(&seed_id)
                    .ok_or(PropagationError::UnknownTask(seed_id))?;
                (seed.start_date, seed.end_date)
            }
        };

        let computation =
            CascadePass::new(&task_index, &graph).execute(seed_id, seed_start, seed_end)?;

        let mut outcome = CascadeOutcome {
            skipped_invariant: computation.skipped_invariant,
            processed: computation.processed,
            ..CascadeOutcome::default()
        };
        if computation.updates.is_empty() {
            return Ok(outcome);
        }

        let report = self.store.update_task_dates_batch(&computation.updates);
        if !report.all_persisted() {
            warn!(
                schedule_id,
                failed = report.failed.len(),
                "some dependent tasks could not be rescheduled"
            );
        }
        outcome.updated = computation
            .updates
            .into_iter()
            .filter(|u| report.persisted.contains(&u.task_id))
            .collect();
        outcome.failed_writes = report.failed;
        Ok(outcome)
    }
}
