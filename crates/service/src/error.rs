//! Errors raised at the service boundary.

use crmflow_core::error::CoreError;

/// Failure of a workflow service call or builder operation.
///
/// On any of these the builder leaves its in-memory state untouched.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The collaborator answered with a non-2xx status code.
    #[error("Workflow service error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    #[error("Request was cancelled")]
    Cancelled,

    #[error("Workflow '{id}' is not active")]
    Inactive { id: String },

    /// Local validation blocked the operation.
    #[error("Workflow is invalid: {}", .0.join("; "))]
    InvalidWorkflow(Vec<String>),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ServiceError {
    /// Whether the collaborator reported the entity as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ServiceError::Core(CoreError::NotFound { .. }) | ServiceError::Api { status: 404, .. }
        )
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
