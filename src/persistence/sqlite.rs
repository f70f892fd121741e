use super::{
    validate_dependencies, validate_tasks, BatchWriteReport, PersistenceError, PersistenceResult,
    ScheduleStore,
};
use crate::dependency::{Dependency, DependencyType};
use crate::graph::validate_new_edge;
use crate::schedule::{Schedule, ScheduleStatus};
use crate::task::{Task, TaskDateUpdate, TaskStatus};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteScheduleStore {
    connection: Mutex<Connection>,
}

impl SqliteScheduleStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS schedules (
                id INTEGER PRIMARY KEY,
                project_name TEXT NOT NULL,
                start_date TEXT NOT NULL,
                target_end_date TEXT NOT NULL,
                actual_end_date TEXT,
                status TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY,
                schedule_id INTEGER NOT NULL REFERENCES schedules(id),
                name TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                duration_days INTEGER NOT NULL,
                percent_complete REAL NOT NULL,
                status TEXT NOT NULL,
                parent_id INTEGER,
                sort_order INTEGER NOT NULL,
                contractor_id INTEGER,
                budget_category_id INTEGER,
                is_milestone INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS dependencies (
                id INTEGER PRIMARY KEY,
                schedule_id INTEGER NOT NULL REFERENCES schedules(id),
                predecessor_id INTEGER NOT NULL REFERENCES tasks(id),
                successor_id INTEGER NOT NULL REFERENCES tasks(id),
                dependency_type TEXT NOT NULL,
                lag_days INTEGER NOT NULL,
                UNIQUE (predecessor_id, successor_id)
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_schedule ON tasks(schedule_id);
            CREATE INDEX IF NOT EXISTS idx_dependencies_schedule ON dependencies(schedule_id);
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    pub fn upsert_schedule(&self, schedule: &Schedule) -> PersistenceResult<()> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        conn.execute(
            "INSERT INTO schedules (id, project_name, start_date, target_end_date, actual_end_date, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                project_name = excluded.project_name,
                start_date = excluded.start_date,
                target_end_date = excluded.target_end_date,
                actual_end_date = excluded.actual_end_date,
                status = excluded.status",
            params![
                schedule.id,
                schedule.project_name,
                format_date(schedule.start_date),
                format_date(schedule.target_end_date),
                schedule.actual_end_date.map(format_date),
                schedule.status.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn upsert_task(&self, task: &Task) -> PersistenceResult<()> {
        validate_tasks(std::slice::from_ref(task))?;
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        conn.execute(
            "INSERT INTO tasks (id, schedule_id, name, start_date, end_date, duration_days,
                                percent_complete, status, parent_id, sort_order, contractor_id,
                                budget_category_id, is_milestone)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(id) DO UPDATE SET
                schedule_id = excluded.schedule_id,
                name = excluded.name,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                duration_days = excluded.duration_days,
                percent_complete = excluded.percent_complete,
                status = excluded.status,
                parent_id = excluded.parent_id,
                sort_order = excluded.sort_order,
                contractor_id = excluded.contractor_id,
                budget_category_id = excluded.budget_category_id,
                is_milestone = excluded.is_milestone",
            params![
                task.id,
                task.schedule_id,
                task.name,
                format_date(task.start_date),
                format_date(task.end_date),
                task.duration_days,
                task.percent_complete,
                task.status.as_str(),
                task.parent_id,
                task.sort_order,
                task.contractor_id,
                task.budget_category_id,
                task.is_milestone,
            ],
        )?;
        Ok(())
    }

    pub fn insert_dependency(&self, dependency: &Dependency) -> PersistenceResult<()> {
        let existing = self.list_dependencies(dependency.schedule_id)?;
        validate_new_edge(
            &existing,
            dependency.predecessor_id,
            dependency.successor_id,
        )
        .map_err(|err| PersistenceError::InvalidData(err.to_string()))?;

        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        conn.execute(
            "INSERT INTO dependencies (id, schedule_id, predecessor_id, successor_id, dependency_type, lag_days)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                dependency.id,
                dependency.schedule_id,
                dependency.predecessor_id,
                dependency.successor_id,
                dependency.kind.as_str(),
                dependency.lag_days,
            ],
        )?;
        Ok(())
    }

    pub fn update_dependency(&self, dependency: &Dependency) -> PersistenceResult<()> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        let changed = conn.execute(
            "UPDATE dependencies SET dependency_type = ?2, lag_days = ?3 WHERE id = ?1",
            params![
                dependency.id,
                dependency.kind.as_str(),
                dependency.lag_days,
            ],
        )?;
        if changed == 0 {
            return Err(PersistenceError::NotFound);
        }
        Ok(())
    }

    pub fn delete_dependency(&self, dependency_id: i64) -> PersistenceResult<()> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        conn.execute(
            "DELETE FROM dependencies WHERE id = ?1",
            params![dependency_id],
        )?;
        Ok(())
    }
}

impl ScheduleStore for SqliteScheduleStore {
    fn get_schedule(&self, schedule_id: i64) -> PersistenceResult<Option<Schedule>> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        let row: Option<(i64, String, String, String, Option<String>, String)> = conn
            .query_row(
                "SELECT id, project_name, start_date, target_end_date, actual_end_date, status
                 FROM schedules WHERE id = ?1",
                params![schedule_id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, project_name, start, target_end, actual_end, status)) = row else {
            return Ok(None);
        };
        Ok(Some(Schedule {
            id,
            project_name,
            start_date: parse_date(&start)?,
            target_end_date: parse_date(&target_end)?,
            actual_end_date: actual_end.as_deref().map(parse_date).transpose()?,
            status: ScheduleStatus::from_str(&status).ok_or_else(|| {
                PersistenceError::InvalidData(format!("unknown schedule status '{status}'"))
            })?,
        }))
    }

    fn list_tasks(&self, schedule_id: i64) -> PersistenceResult<Vec<Task>> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, schedule_id, name, start_date, end_date, duration_days, percent_complete,
                    status, parent_id, sort_order, contractor_id, budget_category_id, is_milestone
             FROM tasks WHERE schedule_id = ?1 ORDER BY sort_order, id",
        )?;
        let rows = stmt.query_map(params![schedule_id], task_row)?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(task_from_row(row?)?);
        }
        Ok(tasks)
    }

    fn get_task(&self, task_id: i64) -> PersistenceResult<Option<Task>> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        let row = conn
            .query_row(
                "SELECT id, schedule_id, name, start_date, end_date, duration_days, percent_complete,
                        status, parent_id, sort_order, contractor_id, budget_category_id, is_milestone
                 FROM tasks WHERE id = ?1",
                params![task_id],
                task_row,
            )
            .optional()?;
        row.map(task_from_row).transpose()
    }

    fn list_dependencies(&self, schedule_id: i64) -> PersistenceResult<Vec<Dependency>> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, schedule_id, predecessor_id, successor_id, dependency_type, lag_days
             FROM dependencies WHERE schedule_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![schedule_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut dependencies = Vec::new();
        for row in rows {
            let (id, schedule_id, predecessor_id, successor_id, kind, lag_days) = row?;
            dependencies.push(Dependency {
                id,
                schedule_id,
                predecessor_id,
                successor_id,
                kind: DependencyType::from_str(&kind).ok_or_else(|| {
                    PersistenceError::InvalidData(format!("unknown dependency type '{kind}'"))
                })?,
                lag_days,
            });
        }
        Ok(dependencies)
    }

    fn update_task_dates(
        &self,
        task_id: i64,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> PersistenceResult<()> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        let changed = conn.execute(
            "UPDATE tasks SET start_date = ?2, end_date = ?3, duration_days = ?4 WHERE id = ?1",
            params![
                task_id,
                format_date(start_date),
                format_date(end_date),
                (end_date - start_date).num_days(),
            ],
        )?;
        if changed == 0 {
            return Err(PersistenceError::NotFound);
        }
        Ok(())
    }

    fn update_task_dates_batch(&self, updates: &[TaskDateUpdate]) -> BatchWriteReport {
        let mut report = BatchWriteReport::default();
        let mut conn = self.connection.lock().expect("sqlite mutex poisoned");
        let tx = match conn.transaction() {
            Ok(tx) => tx,
            Err(err) => return batch_unavailable(updates, &err.to_string()),
        };

        for update in updates {
            let result = tx.execute(
                "UPDATE tasks SET start_date = ?2, end_date = ?3, duration_days = ?4 WHERE id = ?1",
                params![
                    update.task_id,
                    format_date(update.start_date),
                    format_date(update.end_date),
                    (update.end_date - update.start_date).num_days(),
                ],
            );
            match result {
                Ok(0) => report
                    .failed
                    .push((update.task_id, PersistenceError::NotFound)),
                Ok(_) => report.persisted.push(update.task_id),
                Err(err) => report.failed.push((update.task_id, err.into())),
            }
        }

        if let Err(err) = tx.commit() {
            let persisted = std::mem::take(&mut report.persisted);
            for task_id in persisted {
                report.failed.push((
                    task_id,
                    PersistenceError::InvalidData(format!("transaction commit failed: {err}")),
                ));
            }
        }
        report
    }
}

/// No transaction could be opened, so no write was attempted. Every update in
/// the batch is reported as failed, each under its own task id.
fn batch_unavailable(updates: &[TaskDateUpdate], reason: &str) -> BatchWriteReport {
    let mut report = BatchWriteReport::default();
    for update in updates {
        report.failed.push((
            update.task_id,
            PersistenceError::InvalidData(format!("transaction unavailable: {reason}")),
        ));
    }
    report
}

/// Validate the full schedule content as stored, the same checks the file
/// formats apply on load.
pub fn validate_stored_schedule(
    store: &SqliteScheduleStore,
    schedule_id: i64,
) -> PersistenceResult<()> {
    let tasks = store.list_tasks(schedule_id)?;
    let dependencies = store.list_dependencies(schedule_id)?;
    validate_tasks(&tasks)?;
    validate_dependencies(&tasks, &dependencies)
}

type TaskRow = (
    i64,
    i64,
    String,
    String,
    String,
    i64,
    f64,
    String,
    Option<i64>,
    i64,
    Option<i64>,
    Option<i64>,
    bool,
);

fn task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
    ))
}

fn task_from_row(row: TaskRow) -> PersistenceResult<Task> {
    let (
        id,
        schedule_id,
        name,
        start,
        end,
        duration_days,
        percent_complete,
        status,
        parent_id,
        sort_order,
        contractor_id,
        budget_category_id,
        is_milestone,
    ) = row;
    Ok(Task {
        id,
        schedule_id,
        name,
        start_date: parse_date(&start)?,
        end_date: parse_date(&end)?,
        duration_days,
        percent_complete,
        status: TaskStatus::from_str(&status).ok_or_else(|| {
            PersistenceError::InvalidData(format!("unknown task status '{status}'"))
        })?,
        parent_id,
        sort_order,
        contractor_id,
        budget_category_id,
        is_milestone,
    })
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(input: &str) -> PersistenceResult<NaiveDate> {
    NaiveDate::parse_from_str(input, DATE_FORMAT)
        .map_err(|e| PersistenceError::InvalidData(format!("invalid date '{input}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn unavailable_transaction_fails_every_update_under_its_own_id() {
        let updates = vec![
            TaskDateUpdate { task_id: 4, start_date: d(2024, 3, 1), end_date: d(2024, 3, 5) },
            TaskDateUpdate { task_id: 7, start_date: d(2024, 3, 6), end_date: d(2024, 3, 9) },
        ];

        let report = batch_unavailable(&updates, "database is locked");

        assert!(report.persisted.is_empty());
        let failed_ids: Vec<i64> = report.failed.iter().map(|(id, _)| *id).collect();
        assert_eq!(failed_ids, vec![4, 7]);
        for (_, err) in &report.failed {
            assert!(matches!(err, PersistenceError::InvalidData(_)));
        }
    }
}
