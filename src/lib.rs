pub mod calculations;
pub mod dependency;
pub mod engine;
pub mod graph;
pub mod persistence;
pub mod schedule;
pub mod task;

pub use calculations::cascade::{CascadeComputation, CascadePass, PropagationError};
pub use dependency::{Dependency, DependencyType};
pub use engine::{CascadeEngine, CascadeError, CascadeOutcome, TaskEditOutcome};
pub use graph::{find_cycle, validate_new_edge, DependencyGraph, DependencyRuleError};
pub use persistence::{
    validate_dependencies, validate_tasks, BatchWriteReport, InMemoryScheduleStore,
    PersistenceError, ScheduleStore,
};
#[cfg(feature = "sqlite")]
pub use persistence::SqliteScheduleStore;
pub use schedule::{Schedule, ScheduleStatus};
pub use task::{Task, TaskDateUpdate, TaskStatus};
