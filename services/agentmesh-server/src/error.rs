//! API error handling

use agentmesh_orchestrator::OrchestrationError;
use agentmesh_payment::PaymentChallenge;
use agentmesh_store::StoreError;
use agentmesh_types::MeshError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Payment missing or rejected; carries instructions for paying
    #[error("{}", payment_message(.reason))]
    PaymentRequired {
        reason: Option<String>,
        challenge: Box<PaymentChallenge>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service temporarily unavailable")]
    ServiceUnavailable,

    #[error("Internal server error")]
    InternalError,
}

fn payment_message(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!("Payment rejected: {}", reason),
        None => "Payment required".to_string(),
    }
}

impl ApiError {
    pub fn error_code(&self) -> i32 {
        match self {
            Self::InvalidParameter(_) => -1100,
            Self::PaymentRequired { .. } => -1402,
            Self::NotFound(_) => -1404,
            Self::Conflict(_) => -1409,
            Self::ServiceUnavailable => -1503,
            Self::InternalError => -1000,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            Self::PaymentRequired { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: i32,
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<PaymentChallenge>,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        let challenge = match err {
            ApiError::PaymentRequired { challenge, .. } => Some(challenge.as_ref().clone()),
            _ => None,
        };
        Self {
            code: err.error_code(),
            msg: err.to_string(),
            challenge,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

impl From<MeshError> for ApiError {
    fn from(err: MeshError) -> Self {
        Self::InvalidParameter(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => Self::NotFound(msg),
            StoreError::Duplicate(msg) => Self::Conflict(msg),
            other => {
                tracing::error!(error = ?other, "Store error");
                Self::InternalError
            }
        }
    }
}

impl From<OrchestrationError> for ApiError {
    fn from(err: OrchestrationError) -> Self {
        match err {
            OrchestrationError::Invalid(e) => e.into(),
            OrchestrationError::Store(e) => e.into(),
            OrchestrationError::CommitContention { agent_id, attempts } => {
                tracing::warn!(agent_id = %agent_id, attempts, "Reputation commit contention");
                Self::ServiceUnavailable
            }
        }
    }
}
