/// Domain errors raised by the core crate.
///
/// Validation *results* (schema outcomes, workflow validation reports) are
/// plain data and never travel through this type; `CoreError` is reserved for
/// operations that cannot proceed at all.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Cannot transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    #[error("Internal error: {0}")]
    Internal(String),
}
