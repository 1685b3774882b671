use thiserror::Error;

/// Custom error type for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Requested record was not found.
    #[error("Not found: {kind} with id '{id}'")]
    NotFound { kind: String, id: String },

    /// Input validation failed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Likely duplicate or already-present record.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A multi-step store operation stopped halfway and could not be undone.
    #[error("Partial failure: {0}")]
    PartialFailure(String),

    /// The external metadata service could not be reached or answered garbage.
    #[error("Metadata service error: {0}")]
    Metadata(String),

    /// The language model planner could not be reached (network, auth, bad payload).
    #[error("Planner unavailable: {0}")]
    PlannerUnavailable(String),

    /// The chat session worker has stopped.
    #[error("Session closed: {0}")]
    SessionClosed(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CatalogError {
    pub fn not_found(kind: &str, id: &str) -> Self {
        CatalogError::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }
}

impl From<surrealdb::Error> for CatalogError {
    fn from(err: surrealdb::Error) -> Self {
        CatalogError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Database(format!("JSON serialization error: {}", err))
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Database(format!("I/O error: {}", err))
    }
}
