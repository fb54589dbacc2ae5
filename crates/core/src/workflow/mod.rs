//! Workflow automation domain: the node/connection graph, its validation and
//! the execution contract.

pub mod execution;
pub mod graph;
pub mod integrations;
pub mod model;
pub mod registry;
pub mod validation;

pub use execution::{ExecutionOutcome, ExecutionPlan, ExecutionRequest, ExecutionStep};
pub use graph::WorkflowGraph;
pub use integrations::{validate_integrations, Integration, IntegrationCatalog};
pub use model::{
    ConnectMode, NodePatch, NodeType, Position, Workflow, WorkflowConnection, WorkflowNode,
    WorkflowPatch, WorkflowStatus, MAX_NODES_PER_WORKFLOW, MAX_WORKFLOW_NAME_LENGTH,
};
pub use registry::{ConfigField, FieldRule, NodeTypeRegistry};
pub use validation::{validate_workflow, WorkflowValidation};
