#![cfg(feature = "sqlite")]

use chrono::NaiveDate;
use schedule_cascade::{
    persistence::sqlite::validate_stored_schedule, CascadeEngine, Dependency, DependencyType,
    PersistenceError, Schedule, ScheduleStatus, ScheduleStore, SqliteScheduleStore, Task,
    TaskDateUpdate, TaskStatus,
};
use tempfile::NamedTempFile;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn seeded_store() -> (NamedTempFile, SqliteScheduleStore) {
    let file = NamedTempFile::new().unwrap();
    let store = SqliteScheduleStore::new(file.path()).unwrap();

    let mut schedule = Schedule::new(1, "Lakeview Remodel", d(2024, 1, 1), d(2024, 6, 30));
    schedule.status = ScheduleStatus::Active;
    store.upsert_schedule(&schedule).unwrap();

    let mut demo = Task::new(1, 1, "Demolition", d(2024, 1, 1), d(2024, 1, 5));
    demo.status = TaskStatus::InProgress;
    demo.percent_complete = 40.0;
    demo.contractor_id = Some(301);
    store.upsert_task(&demo).unwrap();

    let mut rough_in = Task::new(2, 1, "Rough-in", d(2024, 1, 6), d(2024, 1, 12));
    rough_in.budget_category_id = Some(7);
    rough_in.sort_order = 1;
    store.upsert_task(&rough_in).unwrap();

    store
        .insert_dependency(&Dependency::new(10, 1, 1, 2, DependencyType::FinishToStart, 1))
        .unwrap();

    (file, store)
}

#[test]
fn sqlite_store_round_trips_schedule_tasks_and_dependencies() {
    let (_file, store) = seeded_store();

    let schedule = store.get_schedule(1).unwrap().unwrap();
    assert_eq!(schedule.project_name, "Lakeview Remodel");
    assert_eq!(schedule.status, ScheduleStatus::Active);
    assert_eq!(schedule.start_date, d(2024, 1, 1));
    assert_eq!(schedule.actual_end_date, None);

    let tasks = store.list_tasks(1).unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].id, 1);
    assert_eq!(tasks[0].status, TaskStatus::InProgress);
    assert_eq!(tasks[0].percent_complete, 40.0);
    assert_eq!(tasks[0].contractor_id, Some(301));
    assert_eq!(tasks[1].budget_category_id, Some(7));

    let deps = store.list_dependencies(1).unwrap();
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].kind, DependencyType::FinishToStart);
    assert_eq!(deps[0].lag_days, 1);

    validate_stored_schedule(&store, 1).unwrap();
}

#[test]
fn sqlite_store_enforces_edge_creation_rules() {
    let (_file, store) = seeded_store();

    let reciprocal = Dependency::new(11, 1, 2, 1, DependencyType::FinishToStart, 0);
    assert!(matches!(
        store.insert_dependency(&reciprocal),
        Err(PersistenceError::InvalidData(_))
    ));

    let duplicate = Dependency::new(12, 1, 1, 2, DependencyType::StartToStart, 0);
    assert!(store.insert_dependency(&duplicate).is_err());
}

#[test]
fn update_task_dates_recomputes_duration() {
    let (_file, store) = seeded_store();

    store
        .update_task_dates(2, d(2024, 2, 1), d(2024, 2, 11))
        .unwrap();
    let task = store.get_task(2).unwrap().unwrap();
    assert_eq!(task.start_date, d(2024, 2, 1));
    assert_eq!(task.end_date, d(2024, 2, 11));
    assert_eq!(task.duration_days, 10);

    assert!(matches!(
        store.update_task_dates(99, d(2024, 2, 1), d(2024, 2, 2)),
        Err(PersistenceError::NotFound)
    ));
}

#[test]
fn batch_update_reports_unknown_tasks_and_persists_the_rest() {
    let (_file, store) = seeded_store();

    let updates = vec![
        TaskDateUpdate {
            task_id: 2,
            start_date: d(2024, 3, 1),
            end_date: d(2024, 3, 7),
        },
        TaskDateUpdate {
            task_id: 55,
            start_date: d(2024, 3, 1),
            end_date: d(2024, 3, 7),
        },
    ];
    let report = store.update_task_dates_batch(&updates);

    assert_eq!(report.persisted, vec![2]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, 55);
    assert!(matches!(report.failed[0].1, PersistenceError::NotFound));

    let task = store.get_task(2).unwrap().unwrap();
    assert_eq!(task.duration_days, 6);
}

#[test]
fn cascade_runs_end_to_end_over_sqlite() {
    let (_file, store) = seeded_store();
    let engine = CascadeEngine::new(store);

    let edit = engine
        .apply_task_dates(1, 1, d(2024, 1, 1), d(2024, 1, 8))
        .unwrap();
    let outcome = edit.cascade.unwrap();
    assert_eq!(outcome.updated_ids(), vec![2]);

    // finish_to_start with lag 1: start = predecessor end + 1 + 1.
    let rough_in = engine.store().get_task(2).unwrap().unwrap();
    assert_eq!(rough_in.start_date, d(2024, 1, 10));
    assert_eq!(rough_in.end_date, d(2024, 1, 16));
    assert_eq!(rough_in.duration_days, 6);
}

#[test]
fn dependency_update_then_cascade_over_sqlite() {
    let (_file, store) = seeded_store();

    store
        .update_dependency(&Dependency::new(10, 1, 1, 2, DependencyType::StartToStart, 3))
        .unwrap();

    let engine = CascadeEngine::new(store);
    let outcome = engine.cascade_from_dependency(1, 1).unwrap();
    assert_eq!(outcome.updated_ids(), vec![2]);

    let rough_in = engine.store().get_task(2).unwrap().unwrap();
    assert_eq!(rough_in.start_date, d(2024, 1, 4));
    assert_eq!(rough_in.end_date, d(2024, 1, 10));
}
