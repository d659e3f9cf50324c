//! Error types for AgentMesh domain validation

use thiserror::Error;

/// Result type for AgentMesh domain operations
pub type Result<T> = std::result::Result<T, MeshError>;

/// Domain validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeshError {
    // ========================================================================
    // Registration Errors
    // ========================================================================

    /// Agent registration failed validation
    #[error("Invalid agent registration: {reason}")]
    InvalidRegistration { reason: String },

    /// Unknown payment token
    #[error("Unknown payment token: {value}")]
    UnknownToken { value: String },

    // ========================================================================
    // Orchestration Errors
    // ========================================================================

    /// Orchestration request failed validation
    #[error("Invalid orchestration request: {reason}")]
    InvalidRequest { reason: String },

    /// Unknown orchestration strategy
    #[error("Unknown strategy: {value}")]
    UnknownStrategy { value: String },

    // ========================================================================
    // Audit Errors
    // ========================================================================

    /// Task record already left the pending state
    #[error("Task {task_id} is already {status}")]
    TaskAlreadyFinal { task_id: String, status: String },

    /// Unknown task status
    #[error("Unknown task status: {value}")]
    UnknownTaskStatus { value: String },
}
