//! Store error types

use thiserror::Error;

/// Capability store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Optimistic concurrency check failed on a reputation row
    #[error("Reputation conflict for {agent_id}: expected {expected} tasks, found {actual}")]
    Conflict {
        agent_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::InvalidData(e.to_string())
    }
}

impl From<agentmesh_types::MeshError> for StoreError {
    fn from(e: agentmesh_types::MeshError) -> Self {
        StoreError::InvalidData(e.to_string())
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
