use super::candidate::CandidateTask;
use crate::error::ValidationError;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Structural checks on a candidate list.
///
/// Every dependency must name a task that appears earlier in the list. A
/// list that passes is already in topological order; the cycle check is a
/// second line of defence over the same edges.
pub(crate) fn check_structure(candidates: &[CandidateTask]) -> Result<(), ValidationError> {
    let mut position: HashMap<&str, usize> = HashMap::new();

    for (index, task) in candidates.iter().enumerate() {
        if task.id.is_empty() {
            return Err(ValidationError::Malformed(format!(
                "task #{} has an empty id",
                index + 1
            )));
        }
        if position.insert(task.id.as_str(), index).is_some() {
            return Err(ValidationError::DuplicateId(task.id.clone()));
        }
    }

    for (index, task) in candidates.iter().enumerate() {
        for dependency in &task.depends_on {
            match position.get(dependency.as_str()) {
                None => {
                    return Err(ValidationError::DanglingReference {
                        task: task.id.clone(),
                        dependency: dependency.clone(),
                    })
                }
                Some(&at) if at == index => {
                    return Err(ValidationError::SelfReference(task.id.clone()))
                }
                Some(&at) if at > index => {
                    return Err(ValidationError::ForwardReference {
                        task: task.id.clone(),
                        dependency: dependency.clone(),
                    })
                }
                Some(_) => {}
            }
        }
    }

    check_acyclic(candidates, &position)
}

fn check_acyclic(
    candidates: &[CandidateTask],
    position: &HashMap<&str, usize>,
) -> Result<(), ValidationError> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = candidates
        .iter()
        .map(|task| graph.add_node(task.id.as_str()))
        .collect();

    for (index, task) in candidates.iter().enumerate() {
        for dependency in &task.depends_on {
            if let Some(&at) = position.get(dependency.as_str()) {
                graph.add_edge(nodes[at], nodes[index], ());
            }
        }
    }

    toposort(&graph, None).map(|_| ()).map_err(|cycle| {
        let id = graph
            .node_weight(cycle.node_id())
            .copied()
            .unwrap_or("unknown");
        ValidationError::Cycle(id.to_string())
    })
}
