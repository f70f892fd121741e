use super::{validate_dependencies, validate_tasks, PersistenceError, PersistenceResult};
use crate::dependency::{Dependency, DependencyType};
use crate::schedule::Schedule;
use crate::task::{Task, TaskStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// Full content of one schedule as a portable file: the schedule record plus
/// flat task and dependency lists.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    pub schedule: Schedule,
    pub tasks: Vec<Task>,
    pub dependencies: Vec<Dependency>,
}

impl ScheduleSnapshot {
    pub fn new(schedule: Schedule, tasks: Vec<Task>, dependencies: Vec<Dependency>) -> Self {
        Self {
            schedule,
            tasks,
            dependencies,
        }
    }

    fn validate(&self) -> PersistenceResult<()> {
        validate_tasks(&self.tasks)?;
        validate_dependencies(&self.tasks, &self.dependencies)
    }
}

pub fn save_snapshot_to_json<P: AsRef<Path>>(
    snapshot: &ScheduleSnapshot,
    path: P,
) -> PersistenceResult<()> {
    snapshot.validate()?;
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, snapshot)?;
    Ok(())
}

pub fn load_snapshot_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<ScheduleSnapshot> {
    let file = File::open(path)?;
    let snapshot: ScheduleSnapshot = serde_json::from_reader(file)?;
    snapshot.validate()?;
    Ok(snapshot)
}

#[derive(Serialize, Deserialize)]
struct TaskCsvRecord {
    id: i64,
    schedule_id: i64,
    name: String,
    start_date: String,
    end_date: String,
    duration_days: i64,
    percent_complete: f64,
    status: String,
    parent_id: String,
    sort_order: i64,
    contractor_id: String,
    budget_category_id: String,
    is_milestone: bool,
    // Incoming edges as "predecessor_id:type:lag" joined with ';'.
    predecessors: String,
}

impl TaskCsvRecord {
    fn from_task(task: &Task, incoming: &[&Dependency]) -> Self {
        Self {
            id: task.id,
            schedule_id: task.schedule_id,
            name: task.name.clone(),
            start_date: format_date(task.start_date),
            end_date: format_date(task.end_date),
            duration_days: task.duration_days,
            percent_complete: task.percent_complete,
            status: task.status.as_str().to_string(),
            parent_id: format_option_i64(task.parent_id),
            sort_order: task.sort_order,
            contractor_id: format_option_i64(task.contractor_id),
            budget_category_id: format_option_i64(task.budget_category_id),
            is_milestone: task.is_milestone,
            predecessors: join_dependency_refs(incoming),
        }
    }

    fn into_task_and_edges(self) -> PersistenceResult<(Task, Vec<(i64, DependencyType, i64)>)> {
        let status = TaskStatus::from_str(self.status.trim()).ok_or_else(|| {
            PersistenceError::InvalidData(format!("invalid task status '{}'", self.status))
        })?;
        let task = Task {
            id: self.id,
            schedule_id: self.schedule_id,
            name: self.name,
            start_date: parse_date(&self.start_date)?,
            end_date: parse_date(&self.end_date)?,
            duration_days: self.duration_days,
            percent_complete: self.percent_complete,
            status,
            parent_id: parse_option_i64(&self.parent_id)?,
            sort_order: self.sort_order,
            contractor_id: parse_option_i64(&self.contractor_id)?,
            budget_category_id: parse_option_i64(&self.budget_category_id)?,
            is_milestone: self.is_milestone,
        };
        let edges = split_dependency_refs(&self.predecessors)?;
        Ok((task, edges))
    }
}

pub fn save_tasks_to_csv<P: AsRef<Path>>(
    snapshot: &ScheduleSnapshot,
    path: P,
) -> PersistenceResult<()> {
    snapshot.validate()?;
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for task in &snapshot.tasks {
        let incoming: Vec<&Dependency> = snapshot
            .dependencies
            .iter()
            .filter(|d| d.successor_id == task.id)
            .collect();
        writer.serialize(TaskCsvRecord::from_task(task, &incoming))?;
    }
    writer.flush()?;
    Ok(())
}

/// Load tasks and edges from CSV. The CSV carries no schedule record, so the
/// caller supplies one; dependency ids are regenerated sequentially.
pub fn load_tasks_from_csv<P: AsRef<Path>>(
    schedule: Schedule,
    path: P,
) -> PersistenceResult<ScheduleSnapshot> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);

    let mut tasks = Vec::new();
    let mut dependencies = Vec::new();
    let mut next_edge_id = 1i64;
    for record in reader.deserialize::<TaskCsvRecord>() {
        let record = record?;
        let (task, edges) = record.into_task_and_edges()?;
        for (predecessor_id, kind, lag_days) in edges {
            dependencies.push(Dependency {
                id: next_edge_id,
                schedule_id: task.schedule_id,
                predecessor_id,
                successor_id: task.id,
                kind,
                lag_days,
            });
            next_edge_id += 1;
        }
        tasks.push(task);
    }

    if tasks.is_empty() {
        return Err(PersistenceError::InvalidData(
            "CSV file contained no tasks".into(),
        ));
    }

    let snapshot = ScheduleSnapshot::new(schedule, tasks, dependencies);
    snapshot.validate()?;
    Ok(snapshot)
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(input: &str) -> PersistenceResult<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| PersistenceError::InvalidData(format!("invalid date '{input}': {e}")))
}

fn format_option_i64(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn parse_option_i64(input: &str) -> PersistenceResult<Option<i64>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    input
        .trim()
        .parse::<i64>()
        .map(Some)
        .map_err(|e| PersistenceError::InvalidData(format!("invalid integer '{input}': {e}")))
}

fn join_dependency_refs(incoming: &[&Dependency]) -> String {
    incoming
        .iter()
        .map(|d| format!("{}:{}:{}", d.predecessor_id, d.kind.as_str(), d.lag_days))
        .collect::<Vec<_>>()
        .join(";")
}

fn split_dependency_refs(input: &str) -> PersistenceResult<Vec<(i64, DependencyType, i64)>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }
    input
        .split(';')
        .map(|part| {
            let mut fields = part.trim().splitn(3, ':');
            let predecessor = fields.next().unwrap_or_default();
            let kind = fields.next().unwrap_or_default();
            let lag = fields.next().unwrap_or_default();

            let predecessor_id = predecessor.parse::<i64>().map_err(|e| {
                PersistenceError::InvalidData(format!("invalid predecessor id '{predecessor}': {e}"))
            })?;
            let kind = DependencyType::from_str(kind).ok_or_else(|| {
                PersistenceError::InvalidData(format!("invalid dependency type '{kind}'"))
            })?;
            let lag_days = lag.parse::<i64>().map_err(|e| {
                PersistenceError::InvalidData(format!("invalid lag '{lag}': {e}"))
            })?;
            Ok((predecessor_id, kind, lag_days))
        })
        .collect()
}
