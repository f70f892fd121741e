use crate::dependency::Dependency;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::fmt;

/// Adjacency index over a schedule's dependency edges, keyed by predecessor.
/// Built once per cascade run from the edge set loaded at the start of the run.
pub struct DependencyGraph {
    outgoing: HashMap<i64, Vec<Dependency>>,
    edge_count: usize,
}

impl DependencyGraph {
    pub fn build(dependencies: &[Dependency]) -> Self {
        let mut outgoing: HashMap<i64, Vec<Dependency>> = HashMap::new();
        for edge in dependencies {
            outgoing
                .entry(edge.predecessor_id)
                .or_default()
                .push(edge.clone());
        }
        Self {
            outgoing,
            edge_count: dependencies.len(),
        }
    }

    /// Edges whose predecessor is `task_id`, in input order.
    pub fn outgoing(&self, task_id: i64) -> &[Dependency] {
        self.outgoing.get(&task_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }
}

/// Diagnostic: detect any cycle in the edge set, returning the task ids left
/// unordered by a topological sort. Creation-time checks only reject 2-cycles,
/// so longer cycles can exist in stored data; the cascade tolerates them via
/// its visited set, and this reports them for repair.
pub fn find_cycle(dependencies: &[Dependency]) -> Option<Vec<i64>> {
    let mut graph: DiGraph<i64, ()> = DiGraph::new();
    let mut id_to_index: HashMap<i64, NodeIndex> = HashMap::new();

    for edge in dependencies {
        for task_id in [edge.predecessor_id, edge.successor_id] {
            id_to_index
                .entry(task_id)
                .or_insert_with(|| graph.add_node(task_id));
        }
    }
    for edge in dependencies {
        let u = id_to_index[&edge.predecessor_id];
        let v = id_to_index[&edge.successor_id];
        graph.add_edge(u, v, ());
    }

    match toposort(&graph, None) {
        Ok(_) => None,
        Err(cycle) => {
            // toposort reports one node on the cycle; walk the strongly
            // connected component containing it for a useful diagnostic.
            let start = cycle.node_id();
            let members: Vec<i64> = petgraph::algo::kosaraju_scc(&graph)
                .into_iter()
                .find(|scc| scc.contains(&start) && scc.len() > 1)
                .map(|scc| scc.into_iter().map(|ix| graph[ix]).collect())
                .unwrap_or_else(|| vec![graph[start]]);
            Some(members)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyRuleError {
    SelfDependency { task_id: i64 },
    ReciprocalDependency { predecessor_id: i64, successor_id: i64 },
    DuplicateEdge { predecessor_id: i64, successor_id: i64 },
}

impl fmt::Display for DependencyRuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyRuleError::SelfDependency { task_id } => {
                write!(f, "task {task_id} cannot depend on itself")
            }
            DependencyRuleError::ReciprocalDependency {
                predecessor_id,
                successor_id,
            } => write!(
                f,
                "tasks {predecessor_id} and {successor_id} already depend on each other in the opposite direction"
            ),
            DependencyRuleError::DuplicateEdge {
                predecessor_id,
                successor_id,
            } => write!(
                f,
                "dependency {predecessor_id} -> {successor_id} already exists"
            ),
        }
    }
}

impl std::error::Error for DependencyRuleError {}

/// Creation-time edge rules: no self-dependency, no reciprocal pair, no
/// duplicate pair. Longer cycles are not rejected here; see [`find_cycle`].
pub fn validate_new_edge(
    existing: &[Dependency],
    predecessor_id: i64,
    successor_id: i64,
) -> Result<(), DependencyRuleError> {
    if predecessor_id == successor_id {
        return Err(DependencyRuleError::SelfDependency {
            task_id: predecessor_id,
        });
    }
    for edge in existing {
        if edge.predecessor_id == predecessor_id && edge.successor_id == successor_id {
            return Err(DependencyRuleError::DuplicateEdge {
                predecessor_id,
                successor_id,
            });
        }
        if edge.predecessor_id == successor_id && edge.successor_id == predecessor_id {
            return Err(DependencyRuleError::ReciprocalDependency {
                predecessor_id,
                successor_id,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::DependencyType;

    fn edge(id: i64, pred: i64, succ: i64) -> Dependency {
        Dependency::new(id, 1, pred, succ, DependencyType::FinishToStart, 0)
    }

    #[test]
    fn adjacency_index_groups_edges_by_predecessor() {
        let deps = vec![edge(1, 10, 20), edge(2, 10, 30), edge(3, 20, 30)];
        let graph = DependencyGraph::build(&deps);

        assert_eq!(graph.edge_count(), 3);
        let out: Vec<i64> = graph.outgoing(10).iter().map(|e| e.successor_id).collect();
        assert_eq!(out, vec![20, 30]);
        assert!(graph.outgoing(30).is_empty());
    }

    #[test]
    fn find_cycle_reports_three_node_loop() {
        let deps = vec![edge(1, 1, 2), edge(2, 2, 3), edge(3, 3, 1)];
        let mut members = find_cycle(&deps).expect("cycle expected");
        members.sort();
        assert_eq!(members, vec![1, 2, 3]);
    }

    #[test]
    fn find_cycle_none_for_dag() {
        let deps = vec![edge(1, 1, 2), edge(2, 1, 3), edge(3, 2, 4), edge(4, 3, 4)];
        assert_eq!(find_cycle(&deps), None);
    }
}
