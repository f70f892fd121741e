use chrono::NaiveDate;
use schedule_cascade::{
    CascadeEngine, CascadeError, Dependency, DependencyType, InMemoryScheduleStore,
    PersistenceError, Schedule, ScheduleStore, Task,
};
use std::collections::HashSet;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn seeded_store() -> InMemoryScheduleStore {
    let store = InMemoryScheduleStore::new();
    store.upsert_schedule(Schedule::new(1, "Hillside Duplex", d(2024, 1, 1), d(2024, 6, 30)));
    store.upsert_task(Task::new(1, 1, "Excavation", d(2024, 1, 1), d(2024, 1, 5)));
    store.upsert_task(Task::new(2, 1, "Foundation", d(2024, 1, 6), d(2024, 1, 12)));
    store.upsert_task(Task::new(3, 1, "Framing", d(2024, 1, 13), d(2024, 1, 20)));
    store
        .insert_dependency(Dependency::new(10, 1, 1, 2, DependencyType::FinishToStart, 0))
        .unwrap();
    store
        .insert_dependency(Dependency::new(11, 1, 2, 3, DependencyType::FinishToStart, 0))
        .unwrap();
    store
}

/// Delegating store whose dependency fetch always fails.
struct BrokenFetchStore {
    inner: InMemoryScheduleStore,
}

impl ScheduleStore for BrokenFetchStore {
    fn get_schedule(&self, schedule_id: i64) -> Result<Option<Schedule>, PersistenceError> {
        self.inner.get_schedule(schedule_id)
    }
    fn list_tasks(&self, schedule_id: i64) -> Result<Vec<Task>, PersistenceError> {
        self.inner.list_tasks(schedule_id)
    }
    fn get_task(&self, task_id: i64) -> Result<Option<Task>, PersistenceError> {
        self.inner.get_task(task_id)
    }
    fn list_dependencies(&self, _schedule_id: i64) -> Result<Vec<Dependency>, PersistenceError> {
        Err(PersistenceError::InvalidData(
            "dependency table unavailable".into(),
        ))
    }
    fn update_task_dates(
        &self,
        task_id: i64,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<(), PersistenceError> {
        self.inner.update_task_dates(task_id, start_date, end_date)
    }
}

/// Delegating store that refuses date writes for a chosen set of tasks.
struct FlakyWriteStore {
    inner: InMemoryScheduleStore,
    refuse: HashSet<i64>,
}

impl ScheduleStore for FlakyWriteStore {
    fn get_schedule(&self, schedule_id: i64) -> Result<Option<Schedule>, PersistenceError> {
        self.inner.get_schedule(schedule_id)
    }
    fn list_tasks(&self, schedule_id: i64) -> Result<Vec<Task>, PersistenceError> {
        self.inner.list_tasks(schedule_id)
    }
    fn get_task(&self, task_id: i64) -> Result<Option<Task>, PersistenceError> {
        self.inner.get_task(task_id)
    }
    fn list_dependencies(&self, schedule_id: i64) -> Result<Vec<Dependency>, PersistenceError> {
        self.inner.list_dependencies(schedule_id)
    }
    fn update_task_dates(
        &self,
        task_id: i64,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<(), PersistenceError> {
        if self.refuse.contains(&task_id) {
            return Err(PersistenceError::InvalidData(format!(
                "write refused for task {task_id}"
            )));
        }
        self.inner.update_task_dates(task_id, start_date, end_date)
    }
}

#[test]
fn fetch_failure_aborts_without_any_writes() {
    let store = BrokenFetchStore {
        inner: seeded_store(),
    };
    let engine = CascadeEngine::new(store);

    let err = engine
        .cascade_from_task(1, 1, d(2024, 1, 1), d(2024, 1, 9))
        .unwrap_err();
    assert!(matches!(err, CascadeError::DataAccess(_)));

    // Fail-closed: downstream tasks kept their dates.
    let foundation = engine.store().inner.task(2).unwrap();
    assert_eq!(foundation.start_date, d(2024, 1, 6));
    let framing = engine.store().inner.task(3).unwrap();
    assert_eq!(framing.start_date, d(2024, 1, 13));
}

#[test]
fn partial_write_failure_is_best_effort_and_reported_per_task() {
    let store = FlakyWriteStore {
        inner: seeded_store(),
        refuse: HashSet::from([2]),
    };
    let engine = CascadeEngine::new(store);

    let outcome = engine
        .cascade_from_task(1, 1, d(2024, 1, 1), d(2024, 1, 9))
        .unwrap();

    assert!(!outcome.is_clean());
    assert_eq!(outcome.failed_writes.len(), 1);
    assert_eq!(outcome.failed_writes[0].0, 2);
    // The write after the failed one was still attempted and landed.
    assert_eq!(outcome.updated_ids(), vec![3]);

    let foundation = engine.store().inner.task(2).unwrap();
    assert_eq!(foundation.start_date, d(2024, 1, 6));
    let framing = engine.store().inner.task(3).unwrap();
    assert_eq!(framing.start_date, d(2024, 1, 17));
}

#[test]
fn apply_task_dates_persists_the_edit_and_then_cascades() {
    let engine = CascadeEngine::new(seeded_store());

    let edit = engine
        .apply_task_dates(1, 1, d(2024, 1, 2), d(2024, 1, 9))
        .unwrap();
    assert_eq!(edit.task_id, 1);

    let excavation = engine.store().task(1).unwrap();
    assert_eq!((excavation.start_date, excavation.end_date), (d(2024, 1, 2), d(2024, 1, 9)));
    assert_eq!(excavation.duration_days, 7);

    let outcome = edit.cascade.unwrap();
    assert!(outcome.is_clean());
    assert_eq!(outcome.updated_ids(), vec![2, 3]);
    let foundation = engine.store().task(2).unwrap();
    assert_eq!(foundation.start_date, d(2024, 1, 10));
    assert_eq!(foundation.end_date, d(2024, 1, 16));
    let framing = engine.store().task(3).unwrap();
    assert_eq!(framing.start_date, d(2024, 1, 17));
    assert_eq!(framing.end_date, d(2024, 1, 24));
}

#[test]
fn concurrent_edits_to_one_schedule_land_as_a_serial_order() {
    let engine = CascadeEngine::new(seeded_store());

    std::thread::scope(|s| {
        s.spawn(|| {
            engine
                .apply_task_dates(1, 1, d(2024, 1, 1), d(2024, 1, 9))
                .unwrap();
        });
        s.spawn(|| {
            engine
                .apply_task_dates(1, 1, d(2024, 1, 1), d(2024, 1, 3))
                .unwrap();
        });
    });

    let excavation = engine.store().task(1).unwrap();
    let foundation = engine.store().task(2).unwrap();
    let framing = engine.store().task(3).unwrap();
    let final_state = (
        excavation.end_date,
        foundation.start_date,
        foundation.end_date,
        framing.start_date,
        framing.end_date,
    );

    // Whichever edit ran second owns the whole chain. A mix of the two runs
    // across the chain would mean they interleaved.
    let from_late_finish = (
        d(2024, 1, 9),
        d(2024, 1, 10),
        d(2024, 1, 16),
        d(2024, 1, 17),
        d(2024, 1, 24),
    );
    let from_early_finish = (
        d(2024, 1, 3),
        d(2024, 1, 4),
        d(2024, 1, 10),
        d(2024, 1, 11),
        d(2024, 1, 18),
    );
    assert!(final_state == from_late_finish || final_state == from_early_finish);
}

#[test]
fn batch_write_default_reports_missing_tasks() {
    let store = seeded_store();
    let updates = vec![
        schedule_cascade::TaskDateUpdate {
            task_id: 2,
            start_date: d(2024, 2, 1),
            end_date: d(2024, 2, 5),
        },
        schedule_cascade::TaskDateUpdate {
            task_id: 77,
            start_date: d(2024, 2, 1),
            end_date: d(2024, 2, 5),
        },
    ];

    let report = store.update_task_dates_batch(&updates);
    assert_eq!(report.persisted, vec![2]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, 77);
    assert!(matches!(report.failed[0].1, PersistenceError::NotFound));
}

#[test]
fn cascades_on_different_schedules_are_independent() {
    let store = InMemoryScheduleStore::new();
    store.upsert_schedule(Schedule::new(1, "North Lot", d(2024, 1, 1), d(2024, 6, 30)));
    store.upsert_schedule(Schedule::new(2, "South Lot", d(2024, 1, 1), d(2024, 6, 30)));
    store.upsert_task(Task::new(1, 1, "North slab", d(2024, 1, 1), d(2024, 1, 5)));
    store.upsert_task(Task::new(2, 2, "South slab", d(2024, 1, 1), d(2024, 1, 5)));
    store.upsert_task(Task::new(3, 2, "South walls", d(2024, 1, 6), d(2024, 1, 10)));
    store
        .insert_dependency(Dependency::new(10, 2, 2, 3, DependencyType::FinishToStart, 0))
        .unwrap();

    let engine = CascadeEngine::new(store);
    assert!(engine.store().get_schedule(2).unwrap().is_some());

    // Schedule 1 has no edges at all; its cascade must not see schedule 2's.
    let outcome = engine
        .cascade_from_task(1, 1, d(2024, 1, 1), d(2024, 1, 9))
        .unwrap();
    assert!(outcome.updated.is_empty());

    let outcome = engine
        .cascade_from_task(2, 2, d(2024, 1, 1), d(2024, 1, 7))
        .unwrap();
    assert_eq!(outcome.updated_ids(), vec![3]);
}
