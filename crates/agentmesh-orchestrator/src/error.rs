//! Orchestration error types

use agentmesh_store::StoreError;
use agentmesh_types::MeshError;
use thiserror::Error;

/// Fatal workflow errors. Per-task failures are reported in the result instead.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("Invalid workflow: {0}")]
    Invalid(#[from] MeshError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Reputation for {agent_id} still contended after {attempts} attempts")]
    CommitContention { agent_id: String, attempts: u32 },
}

pub type EngineResult<T> = Result<T, OrchestrationError>;

/// Failure of a single remote agent call
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("{}", status_message(*.status, .body))]
    Status { status: u16, body: String },

    #[error("invalid agent response: {0}")]
    Deserialization(String),
}

fn status_message(status: u16, body: &str) -> String {
    if body.trim().is_empty() {
        format!("agent returned HTTP {}", status)
    } else {
        body.to_string()
    }
}

impl From<reqwest::Error> for InvokeError {
    fn from(e: reqwest::Error) -> Self {
        InvokeError::Transport(e.to_string())
    }
}
