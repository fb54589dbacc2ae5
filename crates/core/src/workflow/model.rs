//! Workflow aggregate: nodes, connections, status and the editing operations
//! a builder performs on them.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::CoreError;
use crate::hashing::sha256_hex;
use crate::types::{NodeId, Record, Timestamp, WorkflowId};

// ---------------------------------------------------------------------------
// Limits and canvas defaults
// ---------------------------------------------------------------------------

/// Maximum number of nodes a single workflow may contain.
pub const MAX_NODES_PER_WORKFLOW: usize = 200;

/// Maximum length (in characters) of a workflow name.
pub const MAX_WORKFLOW_NAME_LENGTH: usize = 200;

/// Position of the first node placed on an empty canvas.
pub const DEFAULT_NODE_ORIGIN: Position = Position { x: 100.0, y: 100.0 };

/// Horizontal gap between consecutively added nodes.
pub const DEFAULT_NODE_SPACING: f64 = 220.0;

// ---------------------------------------------------------------------------
// Node types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Trigger,
    Condition,
    Action,
    Delay,
    Integration,
}

impl NodeType {
    /// All recognised node types.
    pub const ALL: &'static [NodeType] = &[
        NodeType::Trigger,
        NodeType::Condition,
        NodeType::Action,
        NodeType::Delay,
        NodeType::Integration,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Trigger => "trigger",
            NodeType::Condition => "condition",
            NodeType::Action => "action",
            NodeType::Delay => "delay",
            NodeType::Integration => "integration",
        }
    }

    /// Human-readable label shown in the builder palette.
    pub fn label(self) -> &'static str {
        match self {
            NodeType::Trigger => "Trigger",
            NodeType::Condition => "Condition",
            NodeType::Action => "Action",
            NodeType::Delay => "Delay",
            NodeType::Integration => "Integration",
        }
    }

    /// Name given to a freshly added node of this type.
    pub fn default_name(self) -> String {
        format!("New {}", self.as_str())
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle of a workflow. Only `Active` workflows may be executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Active,
    Inactive,
}

impl WorkflowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStatus::Draft => "draft",
            WorkflowStatus::Active => "active",
            WorkflowStatus::Inactive => "inactive",
        }
    }

    /// Returns the statuses this one may transition to.
    ///
    /// Transition rules:
    /// - `draft`    -> `active`
    /// - `active`   -> `inactive`
    /// - `inactive` -> `active`
    pub fn valid_transitions(self) -> &'static [WorkflowStatus] {
        match self {
            WorkflowStatus::Draft => &[WorkflowStatus::Active],
            WorkflowStatus::Active => &[WorkflowStatus::Inactive],
            WorkflowStatus::Inactive => &[WorkflowStatus::Active],
        }
    }

    /// Validate that a transition from `self` to `next` is allowed.
    pub fn validate_transition(self, next: WorkflowStatus) -> Result<(), CoreError> {
        if self.valid_transitions().contains(&next) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Nodes and connections
// ---------------------------------------------------------------------------

/// Canvas coordinates. Irrelevant to execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub config: Record,
}

impl WorkflowNode {
    /// String config value, if present.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConnection {
    pub id: String,
    pub from: NodeId,
    pub to: NodeId,
}

/// Partial update for a node. The id is never patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Merged into the existing config key by key; a `null` value removes
    /// the key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Record>,
}

impl NodePatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn config(config: Record) -> Self {
        Self {
            config: Some(config),
            ..Self::default()
        }
    }

    fn apply(self, node: &mut WorkflowNode) {
        if let Some(name) = self.name {
            node.name = name;
        }
        if let Some(position) = self.position {
            node.position = position;
        }
        for (key, value) in self.config.into_iter().flatten() {
            if value.is_null() {
                node.config.remove(&key);
            } else {
                node.config.insert(key, value);
            }
        }
    }
}

/// How [`Workflow::connect_nodes`] treats endpoints that would only be
/// caught later by workflow validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectMode {
    /// Reject unknown endpoints and trigger targets immediately.
    #[default]
    Strict,
    /// Accept them and leave reporting to `validate_workflow`.
    Deferred,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// The workflow aggregate.
///
/// `status` is authoritative; the wire field `is_active` is derived from it
/// and kept in sync by every mutation. Documents that carry only `is_active`
/// are normalised on deserialisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WorkflowDocument")]
pub struct Workflow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<WorkflowId>,
    pub name: String,
    pub description: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_type: Option<String>,
    status: WorkflowStatus,
    is_active: bool,
    pub nodes: Vec<WorkflowNode>,
    pub connections: Vec<WorkflowConnection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

/// Wire shape accepted when deserialising a [`Workflow`].
#[derive(Deserialize)]
struct WorkflowDocument {
    #[serde(default)]
    id: Option<WorkflowId>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    trigger_type: Option<String>,
    #[serde(default)]
    status: Option<WorkflowStatus>,
    #[serde(default)]
    is_active: Option<bool>,
    #[serde(default)]
    nodes: Vec<WorkflowNode>,
    #[serde(default)]
    connections: Vec<WorkflowConnection>,
    #[serde(default)]
    created_at: Option<Timestamp>,
    #[serde(default)]
    updated_at: Option<Timestamp>,
}

impl From<WorkflowDocument> for Workflow {
    fn from(doc: WorkflowDocument) -> Self {
        let status = match (doc.status, doc.is_active) {
            (Some(status), _) => status,
            (None, Some(true)) => WorkflowStatus::Active,
            (None, Some(false)) if doc.id.is_some() => WorkflowStatus::Inactive,
            (None, _) => WorkflowStatus::Draft,
        };
        Self {
            id: doc.id,
            name: doc.name,
            description: doc.description,
            category: doc.category,
            trigger_type: doc.trigger_type,
            status,
            is_active: status == WorkflowStatus::Active,
            nodes: doc.nodes,
            connections: doc.connections,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new("")
    }
}

impl Workflow {
    /// A new, unsaved draft with no nodes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            category: String::new(),
            trigger_type: None,
            status: WorkflowStatus::Draft,
            is_active: false,
            nodes: Vec::new(),
            connections: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Move to `next`, enforcing the status transition rules.
    pub fn set_status(&mut self, next: WorkflowStatus) -> Result<(), CoreError> {
        self.status.validate_transition(next)?;
        self.force_status(next);
        Ok(())
    }

    /// Overwrite the status without transition checks. Stores use this when
    /// the collaborator is the source of truth.
    pub fn force_status(&mut self, status: WorkflowStatus) {
        self.status = status;
        self.is_active = status == WorkflowStatus::Active;
    }

    // -- lookups ---------------------------------------------------------------

    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn triggers(&self) -> impl Iterator<Item = &WorkflowNode> {
        self.nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Trigger)
    }

    /// `triggerType` of the first trigger node, which is what the workflow
    /// summary shows.
    pub fn primary_trigger_type(&self) -> Option<&str> {
        self.triggers().find_map(|n| n.config_str("triggerType"))
    }

    // -- node editing ----------------------------------------------------------

    /// Append a node of `node_type` with a generated id, default name and
    /// position, and empty config. Returns the new id.
    pub fn add_node(&mut self, node_type: NodeType) -> Result<NodeId, CoreError> {
        if self.nodes.len() >= MAX_NODES_PER_WORKFLOW {
            return Err(CoreError::Validation(format!(
                "Workflow cannot contain more than {MAX_NODES_PER_WORKFLOW} nodes"
            )));
        }
        let id = generate_node_id();
        let offset = self.nodes.len() as f64 * DEFAULT_NODE_SPACING;
        self.nodes.push(WorkflowNode {
            id: id.clone(),
            node_type,
            name: node_type.default_name(),
            position: Position::new(DEFAULT_NODE_ORIGIN.x + offset, DEFAULT_NODE_ORIGIN.y),
            config: Record::new(),
        });
        Ok(id)
    }

    /// Merge `patch` into the node with `id`.
    pub fn update_node(&mut self, id: &str, patch: NodePatch) -> Result<(), CoreError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| node_not_found(id))?;
        patch.apply(node);
        Ok(())
    }

    /// Remove the node and every connection that starts or ends at it.
    pub fn delete_node(&mut self, id: &str) -> Result<WorkflowNode, CoreError> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| node_not_found(id))?;
        let removed = self.nodes.remove(index);
        self.connections.retain(|c| c.from != id && c.to != id);
        Ok(removed)
    }

    /// Connect `from` to `to`. Returns the new connection id.
    ///
    /// Self-loops and duplicate edges are always refused. Unknown endpoints
    /// and trigger targets are refused in [`ConnectMode::Strict`] only.
    pub fn connect_nodes(
        &mut self,
        from: &str,
        to: &str,
        mode: ConnectMode,
    ) -> Result<String, CoreError> {
        if from == to {
            return Err(CoreError::Validation(format!(
                "Node '{from}' cannot be connected to itself"
            )));
        }
        if self.connections.iter().any(|c| c.from == from && c.to == to) {
            return Err(CoreError::Validation(format!(
                "Node '{from}' is already connected to '{to}'"
            )));
        }
        if mode == ConnectMode::Strict {
            if self.node(from).is_none() {
                return Err(node_not_found(from));
            }
            let target = self.node(to).ok_or_else(|| node_not_found(to))?;
            if target.node_type == NodeType::Trigger {
                return Err(CoreError::Validation(format!(
                    "Trigger node '{}' cannot have incoming connections",
                    target.name
                )));
            }
        }

        let id = generate_connection_id();
        self.connections.push(WorkflowConnection {
            id: id.clone(),
            from: from.to_string(),
            to: to.to_string(),
        });
        Ok(id)
    }

    /// Remove a single connection by id.
    pub fn disconnect(&mut self, connection_id: &str) -> Result<WorkflowConnection, CoreError> {
        let index = self
            .connections
            .iter()
            .position(|c| c.id == connection_id)
            .ok_or_else(|| CoreError::NotFound {
                entity: "connection",
                id: connection_id.to_string(),
            })?;
        Ok(self.connections.remove(index))
    }

    // -- fingerprint -----------------------------------------------------------

    /// SHA-256 over the user-editable content (name, description, category,
    /// nodes, connections). Ids, status and timestamps are excluded so a
    /// freshly saved copy hashes the same as the draft it came from.
    pub fn content_hash(&self) -> String {
        let content = json!({
            "name": self.name,
            "description": self.description,
            "category": self.category,
            "nodes": self.nodes,
            "connections": self.connections,
        });
        sha256_hex(content.to_string().as_bytes())
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

fn node_not_found(id: &str) -> CoreError {
    CoreError::NotFound {
        entity: "node",
        id: id.to_string(),
    }
}

pub fn generate_node_id() -> NodeId {
    format!("node_{}", Uuid::new_v4().simple())
}

pub fn generate_connection_id() -> String {
    format!("conn_{}", Uuid::new_v4().simple())
}

// ---------------------------------------------------------------------------
// Partial workflow update
// ---------------------------------------------------------------------------

/// All-optional partial update of a workflow, the body of an update call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// `Some(None)` clears the stored value and goes on the wire as `null`.
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub trigger_type: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkflowStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<WorkflowNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<Vec<WorkflowConnection>>,
}

impl WorkflowPatch {
    /// Patch that replaces every editable field with the draft's content.
    /// Status is left untouched.
    pub fn from_workflow(workflow: &Workflow) -> Self {
        Self {
            name: Some(workflow.name.clone()),
            description: Some(workflow.description.clone()),
            category: Some(workflow.category.clone()),
            trigger_type: Some(workflow.trigger_type.clone()),
            status: None,
            is_active: None,
            nodes: Some(workflow.nodes.clone()),
            connections: Some(workflow.connections.clone()),
        }
    }

    /// Patch that only changes the status (and the derived `is_active`).
    pub fn status(status: WorkflowStatus) -> Self {
        Self {
            status: Some(status),
            is_active: Some(status == WorkflowStatus::Active),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// The status this patch asks for, derived from `is_active` when only the
    /// wire flag is present.
    pub fn requested_status(&self) -> Option<WorkflowStatus> {
        self.status.or(match self.is_active {
            Some(true) => Some(WorkflowStatus::Active),
            Some(false) => Some(WorkflowStatus::Inactive),
            None => None,
        })
    }

    /// Apply to `workflow`. A status change is checked against the
    /// transition rules; nothing is modified when it is refused.
    pub fn apply(&self, workflow: &mut Workflow) -> Result<(), CoreError> {
        if let Some(next) = self.requested_status() {
            if next != workflow.status {
                workflow.status.validate_transition(next)?;
            }
        }

        if let Some(name) = &self.name {
            workflow.name = name.clone();
        }
        if let Some(description) = &self.description {
            workflow.description = description.clone();
        }
        if let Some(category) = &self.category {
            workflow.category = category.clone();
        }
        if let Some(trigger_type) = &self.trigger_type {
            workflow.trigger_type = trigger_type.clone();
        }
        if let Some(nodes) = &self.nodes {
            workflow.nodes = nodes.clone();
        }
        if let Some(connections) = &self.connections {
            workflow.connections = connections.clone();
        }
        if let Some(next) = self.requested_status() {
            workflow.force_status(next);
        }
        workflow.touch();
        Ok(())
    }
}

/// Keeps an explicit `null` apart from an absent field.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
