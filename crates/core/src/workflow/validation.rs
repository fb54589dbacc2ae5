//! Structural and config validation of a whole workflow.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::graph::WorkflowGraph;
use super::model::{NodeType, Workflow, MAX_NODES_PER_WORKFLOW, MAX_WORKFLOW_NAME_LENGTH};
use super::registry::NodeTypeRegistry;

/// Result of [`validate_workflow`]. Gates saving and execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl WorkflowValidation {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Validate a workflow. Every applicable check runs; errors are listed in
/// check order.
pub fn validate_workflow(workflow: &Workflow, registry: &NodeTypeRegistry) -> WorkflowValidation {
    let mut errors = Vec::new();

    // -- header ---------------------------------------------------------------

    let name = workflow.name.trim();
    if name.is_empty() {
        errors.push("Workflow name is required".to_string());
    } else if name.chars().count() > MAX_WORKFLOW_NAME_LENGTH {
        errors.push(format!(
            "Workflow name must be at most {MAX_WORKFLOW_NAME_LENGTH} characters"
        ));
    }

    // -- nodes ----------------------------------------------------------------

    if workflow.nodes.is_empty() {
        errors.push("Workflow must contain at least one node".to_string());
    } else if workflow.nodes.len() > MAX_NODES_PER_WORKFLOW {
        errors.push(format!(
            "Workflow cannot contain more than {MAX_NODES_PER_WORKFLOW} nodes (got {})",
            workflow.nodes.len()
        ));
    }

    if workflow.triggers().next().is_none() {
        errors.push("Workflow must have at least one trigger".to_string());
    }

    let mut seen_ids = HashSet::new();
    for node in &workflow.nodes {
        if !seen_ids.insert(node.id.as_str()) {
            errors.push(format!("Duplicate node id '{}'", node.id));
        }
    }

    // -- connections ----------------------------------------------------------

    let mut seen_edges = HashSet::new();
    for conn in &workflow.connections {
        let from = workflow.node(&conn.from);
        let to = workflow.node(&conn.to);
        if from.is_none() {
            errors.push(format!(
                "Connection '{}' starts at unknown node '{}'",
                conn.id, conn.from
            ));
        }
        match to {
            None => errors.push(format!(
                "Connection '{}' ends at unknown node '{}'",
                conn.id, conn.to
            )),
            Some(target) if target.node_type == NodeType::Trigger => errors.push(format!(
                "Trigger '{}' cannot have incoming connections",
                target.name
            )),
            Some(_) => {}
        }
        if conn.from == conn.to {
            errors.push(format!(
                "Connection '{}' connects node '{}' to itself",
                conn.id, conn.from
            ));
        }
        if !seen_edges.insert((conn.from.as_str(), conn.to.as_str())) {
            errors.push(format!(
                "Duplicate connection from '{}' to '{}'",
                conn.from, conn.to
            ));
        }
    }

    // -- config ---------------------------------------------------------------

    for node in &workflow.nodes {
        errors.extend(registry.validate_config(node));
    }

    // -- graph shape ----------------------------------------------------------

    let graph = WorkflowGraph::new(workflow);
    if let Some(cycle) = graph.find_cycle_from(graph.triggers()) {
        errors.push(format!(
            "Workflow contains a cycle: {}",
            cycle
                .iter()
                .map(|id| display_name(workflow, id))
                .collect::<Vec<_>>()
                .join(" -> ")
        ));
    }

    if !graph.triggers().is_empty() {
        for id in graph.unreachable_nodes() {
            errors.push(format!(
                "Node '{}' is not reachable from any trigger",
                display_name(workflow, id)
            ));
        }
    }

    if !errors.is_empty() {
        tracing::debug!(
            workflow_id = workflow.id.as_deref().unwrap_or("<unsaved>"),
            error_count = errors.len(),
            "Workflow validation failed"
        );
    }

    WorkflowValidation::from_errors(errors)
}

fn display_name<'a>(workflow: &'a Workflow, id: &'a str) -> &'a str {
    workflow.node(id).map_or(id, |n| n.name.as_str())
}
