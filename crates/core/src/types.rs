/// Identifiers are opaque strings assigned by the builder (nodes, connections)
/// or by the persistence collaborator (workflows).
pub type WorkflowId = String;

/// Identifier of a node, unique within one workflow.
pub type NodeId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// A JSON object, the shape of every form record and node config.
pub type Record = serde_json::Map<String, serde_json::Value>;
