use super::{PersistenceError, PersistenceResult, ScheduleStore};
use crate::dependency::Dependency;
use crate::graph::{validate_new_edge, DependencyRuleError};
use crate::schedule::Schedule;
use crate::task::Task;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Default)]
struct MemoryState {
    schedules: BTreeMap<i64, Schedule>,
    tasks: BTreeMap<i64, Task>,
    dependencies: Vec<Dependency>,
}

/// Typed in-memory store. Serves as the injected fake in unit tests and as the
/// reference `ScheduleStore` behavior for other backends.
#[derive(Default)]
pub struct InMemoryScheduleStore {
    state: Mutex<MemoryState>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_schedule(&self, schedule: Schedule) {
        self.state.lock().schedules.insert(schedule.id, schedule);
    }

    pub fn upsert_task(&self, task: Task) {
        self.state.lock().tasks.insert(task.id, task);
    }

    /// Insert an edge after the creation-time rules pass (self-dependency,
    /// reciprocal pair, duplicate pair).
    pub fn insert_dependency(&self, dependency: Dependency) -> Result<(), DependencyRuleError> {
        let mut state = self.state.lock();
        let existing: Vec<Dependency> = state
            .dependencies
            .iter()
            .filter(|d| d.schedule_id == dependency.schedule_id)
            .cloned()
            .collect();
        validate_new_edge(
            &existing,
            dependency.predecessor_id,
            dependency.successor_id,
        )?;
        state.dependencies.push(dependency);
        Ok(())
    }

    /// Replace an edge's kind/lag in place. The caller is expected to run a
    /// cascade from the edge's predecessor afterwards.
    pub fn update_dependency(&self, dependency: Dependency) -> PersistenceResult<()> {
        let mut state = self.state.lock();
        match state.dependencies.iter_mut().find(|d| d.id == dependency.id) {
            Some(slot) => {
                *slot = dependency;
                Ok(())
            }
            None => Err(PersistenceError::NotFound),
        }
    }

    pub fn remove_dependency(&self, dependency_id: i64) {
        self.state
            .lock()
            .dependencies
            .retain(|d| d.id != dependency_id);
    }

    pub fn task(&self, task_id: i64) -> Option<Task> {
        self.state.lock().tasks.get(&task_id).cloned()
    }
}

impl ScheduleStore for InMemoryScheduleStore {
    fn get_schedule(&self, schedule_id: i64) -> PersistenceResult<Option<Schedule>> {
        Ok(self.state.lock().schedules.get(&schedule_id).cloned())
    }

    fn list_tasks(&self, schedule_id: i64) -> PersistenceResult<Vec<Task>> {
        Ok(self
            .state
            .lock()
            .tasks
            .values()
            .filter(|t| t.schedule_id == schedule_id)
            .cloned()
            .collect())
    }

    fn get_task(&self, task_id: i64) -> PersistenceResult<Option<Task>> {
        Ok(self.state.lock().tasks.get(&task_id).cloned())
    }

    fn list_dependencies(&self, schedule_id: i64) -> PersistenceResult<Vec<Dependency>> {
        Ok(self
            .state
            .lock()
            .dependencies
            .iter()
            .filter(|d| d.schedule_id == schedule_id)
            .cloned()
            .collect())
    }

    fn update_task_dates(
        &self,
        task_id: i64,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> PersistenceResult<()> {
        let mut state = self.state.lock();
        match state.tasks.get_mut(&task_id) {
            Some(task) => {
                task.set_dates(start_date, end_date);
                Ok(())
            }
            None => Err(PersistenceError::NotFound),
        }
    }
}
