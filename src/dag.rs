//! Execution DAG types and flattening.
//!
//! The upstream planner supplies a phase→task→subtask tree; execution wants a
//! flat, dependency-ordered list. Flattening walks the tree in declaration
//! order, then re-orders depth-first post-order over `dependsOn` edges so
//! every node's dependencies land at a strictly earlier index.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDag {
    #[serde(default)]
    pub phases: Vec<DagPhase>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DagPhase {
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<DagTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DagTask {
    pub name: String,
    #[serde(default)]
    pub subtasks: Vec<DagSubtask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DagSubtask {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// Derived, read-only view of one subtask in dependency order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatNode {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    pub phase_name: String,
    pub task_name: String,
}

/// Compile the tree into a dependency-ordered flat list.
///
/// Edges referencing an id outside the known set are skipped with a warning.
/// A dependency cycle is broken by dropping the back edge, also with a
/// warning, rather than recursing unboundedly; the affected nodes still all
/// appear in the output.
pub fn flatten(dag: &ExecutionDag) -> Vec<FlatNode> {
    let mut nodes = Vec::new();
    for phase in &dag.phases {
        for task in &phase.tasks {
            for subtask in &task.subtasks {
                nodes.push(FlatNode {
                    id: subtask.id.clone(),
                    name: subtask.name.clone(),
                    objective: subtask.objective.clone(),
                    acceptance_criteria: subtask.acceptance_criteria.clone(),
                    depends_on: subtask.depends_on.clone(),
                    phase_name: phase.name.clone(),
                    task_name: task.name.clone(),
                });
            }
        }
    }

    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(position, node)| (node.id.as_str(), position))
        .collect();

    let mut ordered = Vec::with_capacity(nodes.len());
    let mut visited = HashSet::new();
    let mut in_stack = HashSet::new();
    for position in 0..nodes.len() {
        visit(
            position,
            &nodes,
            &index,
            &mut visited,
            &mut in_stack,
            &mut ordered,
        );
    }
    ordered
}

fn visit(
    position: usize,
    nodes: &[FlatNode],
    index: &HashMap<&str, usize>,
    visited: &mut HashSet<usize>,
    in_stack: &mut HashSet<usize>,
    ordered: &mut Vec<FlatNode>,
) {
    if visited.contains(&position) {
        return;
    }
    in_stack.insert(position);
    for dependency in &nodes[position].depends_on {
        match index.get(dependency.as_str()) {
            Some(&dep_position) => {
                if in_stack.contains(&dep_position) {
                    tracing::warn!(
                        "dependency cycle between '{}' and '{}', dropping edge",
                        nodes[position].id,
                        dependency
                    );
                    continue;
                }
                visit(dep_position, nodes, index, visited, in_stack, ordered);
            }
            None => {
                tracing::warn!(
                    "unknown dependency '{}' referenced by '{}', skipping edge",
                    dependency,
                    nodes[position].id
                );
            }
        }
    }
    in_stack.remove(&position);
    visited.insert(position);
    ordered.push(nodes[position].clone());
}
