use crate::calculations::dates::successor_dates;
use crate::graph::DependencyGraph;
use crate::task::{Task, TaskDateUpdate};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropagationError {
    UnknownTask(i64),
    IterationLimitExceeded { limit: usize },
}

impl fmt::Display for PropagationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropagationError::UnknownTask(task_id) => {
                write!(f, "task {task_id} is not part of the loaded schedule")
            }
            PropagationError::IterationLimitExceeded { limit } => {
                write!(f, "propagation exceeded the node limit of {limit}")
            }
        }
    }
}

impl std::error::Error for PropagationError {}

/// Result of one propagation run, before anything is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeComputation {
    /// Staged updates in first-staged order; each carries the final (last
    /// written) dates for its task.
    pub updates: Vec<TaskDateUpdate>,
    /// Number of tasks popped from the queue and expanded.
    pub processed: usize,
    /// Queue pops skipped by the visited-set guard (cycles or reconverging
    /// paths).
    pub revisits_suppressed: usize,
    /// Tasks whose recomputed dates violated `end >= start` and were dropped.
    pub skipped_invariant: Vec<i64>,
}

/// Breadth-first propagation of a date change through the dependency graph.
///
/// Purely computational: operates on a snapshot of tasks and edges taken at
/// the start of the run and stages updates without touching any store, so it
/// can be driven deterministically in tests.
///
/// Policy notes, load-bearing for callers:
/// - Each task is expanded at most once per run (visited set), so cyclic edge
///   sets terminate.
/// - A successor fed by several predecessors in the same run keeps the dates
///   staged by whichever predecessor was processed last (last writer wins);
///   it is not re-expanded once visited.
/// - A computed result equal to the successor's current effective dates stages
///   nothing and stops that branch (stabilization).
/// - Updates cycling back onto the seed task are dropped: the direct edit that
///   triggered the run always wins.
pub struct CascadePass<'a> {
    tasks: &'a HashMap<i64, Task>,
    graph: &'a DependencyGraph,
}

impl<'a> CascadePass<'a> {
    pub fn new(tasks: &'a HashMap<i64, Task>, graph: &'a DependencyGraph) -> Self {
        Self { tasks, graph }
    }

    pub fn execute(
        &self,
        seed_id: i64,
        seed_start: NaiveDate,
        seed_end: NaiveDate,
    ) -> Result<CascadeComputation, PropagationError> {
        if !self.tasks.contains_key(&seed_id) {
            return Err(PropagationError::UnknownTask(seed_id));
        }

        let limit = self.tasks.len();
        let mut effective: HashMap<i64, (NaiveDate, NaiveDate)> = HashMap::new();
        effective.insert(seed_id, (seed_start, seed_end));

        let mut queue: VecDeque<i64> = VecDeque::new();
        queue.push_back(seed_id);

        let mut visited: HashSet<i64> = HashSet::new();
        let mut staged: HashMap<i64, TaskDateUpdate> = HashMap::new();
        let mut staged_order: Vec<i64> = Vec::new();
        let mut processed = 0usize;
        let mut revisits_suppressed = 0usize;
        let mut skipped_invariant: Vec<i64> = Vec::new();

        while let Some(task_id) = queue.pop_front() {
            if !visited.insert(task_id) {
                debug!(task_id, "already expanded in this run; skipping");
                revisits_suppressed += 1;
                continue;
            }
            processed += 1;
            if processed > limit {
                // Unreachable while the visited set is sound; refuse to spin.
                return Err(PropagationError::IterationLimitExceeded { limit });
            }

            let (pred_start, pred_end) = match effective.get(&task_id) {
                Some(dates) => *dates,
                None => {
                    let task = &self.tasks[&task_id];
                    (task.start_date, task.end_date)
                }
            };

            for edge in self.graph.outgoing(task_id) {
                let Some(successor) = self.tasks.get(&edge.successor_id) else {
                    warn!(
                        dependency_id = edge.id,
                        successor_id = edge.successor_id,
                        "dependency points at a task missing from the schedule"
                    );
                    continue;
                };
                if successor.id == seed_id {
                    debug!(
                        dependency_id = edge.id,
                        "edge cycles back onto the edited task; its own dates are kept"
                    );
                    continue;
                }

                let (new_start, new_end) = successor_dates(
                    edge.kind,
                    edge.lag_days,
                    pred_start,
                    pred_end,
                    successor.duration_days,
                );
                if new_end < new_start {
                    error!(
                        task_id = successor.id,
                        duration_days = successor.duration_days,
                        "recomputed dates would put end before start; update dropped"
                    );
                    if !skipped_invariant.contains(&successor.id) {
                        skipped_invariant.push(successor.id);
                    }
                    continue;
                }

                let current = effective
                    .get(&successor.id)
                    .copied()
                    .unwrap_or((successor.start_date, successor.end_date));
                if current == (new_start, new_end) {
                    continue;
                }

                effective.insert(successor.id, (new_start, new_end));
                if staged
                    .insert(
                        successor.id,
                        TaskDateUpdate {
                            task_id: successor.id,
                            start_date: new_start,
                            end_date: new_end,
                        },
                    )
                    .is_none()
                {
                    staged_order.push(successor.id);
                }
                if !visited.contains(&successor.id) {
                    queue.push_back(successor.id);
                }
            }
        }

        let updates = staged_order
            .into_iter()
            .filter_map(|task_id| staged.remove(&task_id))
            .collect();

        Ok(CascadeComputation {
            updates,
            processed,
            revisits_suppressed,
            skipped_invariant,
        })
    }
}
