//! Execution contract: what the core submits to the execution collaborator
//! and how it reads the answer.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::graph::WorkflowGraph;
use super::model::{NodeType, Workflow};
use super::registry::NodeTypeRegistry;
use super::validation::validate_workflow;
use crate::error::CoreError;
use crate::types::{NodeId, Record, Timestamp, WorkflowId};

/// A validated request to run a saved, active workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub workflow_id: WorkflowId,
    pub context: Value,
    pub requested_at: Timestamp,
}

impl ExecutionRequest {
    /// Fail fast unless the workflow is saved, active and valid.
    pub fn prepare(
        workflow: &Workflow,
        context: Value,
        registry: &NodeTypeRegistry,
    ) -> Result<Self, CoreError> {
        let workflow_id = workflow
            .id
            .clone()
            .ok_or_else(|| CoreError::Conflict("Workflow must be saved before it can run".into()))?;

        if !workflow.is_active() {
            return Err(CoreError::Conflict(format!(
                "Workflow '{workflow_id}' is {} and cannot be executed",
                workflow.status()
            )));
        }

        let validation = validate_workflow(workflow, registry);
        if !validation.is_valid {
            return Err(CoreError::Validation(validation.errors.join("; ")));
        }

        Ok(Self {
            workflow_id,
            context,
            requested_at: Utc::now(),
        })
    }
}

/// One executed (or planned) node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub node_id: NodeId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
}

/// Collaborator answer to an execute call.
///
/// Only `success` is required; unknown fields are kept in `diagnostics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<ExecutionStep>,
    #[serde(flatten)]
    pub diagnostics: Record,
}

impl ExecutionOutcome {
    pub fn succeeded(message: impl Into<String>, steps: Vec<ExecutionStep>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            steps,
            diagnostics: Record::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            steps: Vec::new(),
            diagnostics: Record::new(),
        }
    }

    pub fn with_diagnostic(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.diagnostics.insert(key.to_string(), value.into());
        self
    }
}

/// Order in which a workflow's reachable nodes run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub order: Vec<NodeId>,
}

impl ExecutionPlan {
    /// Topological order of the nodes reachable from the triggers.
    pub fn for_workflow(workflow: &Workflow) -> Result<Self, CoreError> {
        let order = WorkflowGraph::new(workflow).execution_order()?;
        Ok(Self { order })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Planned steps with node names and types filled in.
    pub fn steps(&self, workflow: &Workflow) -> Vec<ExecutionStep> {
        self.order
            .iter()
            .map(|id| {
                let node = workflow.node(id);
                ExecutionStep {
                    node_id: id.clone(),
                    name: node.map(|n| n.name.clone()).unwrap_or_default(),
                    node_type: node.map(|n| n.node_type),
                }
            })
            .collect()
    }
}
