//! Paid workflow handler

use std::time::Instant;

use agentmesh_orchestrator::PAYMENT_REFERENCE_HEADER;
use agentmesh_payment::{AdmissionDecision, PaymentChallenge};
use agentmesh_types::{AgentId, OrchestrationRequest, OrchestrationResult};
use axum::{
    extract::{OriginalUri, State},
    http::HeaderMap,
    Json,
};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Optional header naming the registered agent that requests the workflow
pub const REQUESTER_HEADER: &str = "X-Requester-Agent";

/// `POST /api/v1/orchestrate`
pub async fn orchestrate(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Json(request): Json<OrchestrationRequest>,
) -> ApiResult<Json<OrchestrationResult>> {
    request.validate()?;
    let requester = requester(&headers)?;

    let challenge = || {
        let gate = state.engine.gate();
        Box::new(PaymentChallenge::for_resource(
            gate.config(),
            uri.path(),
            state.engine.config().default_token,
        ))
    };

    let Some(reference) = header_str(&headers, PAYMENT_REFERENCE_HEADER) else {
        return Err(ApiError::PaymentRequired {
            reason: None,
            challenge: challenge(),
        });
    };

    let admission_started = Instant::now();
    let payment = match state.engine.gate().admit(reference).await {
        AdmissionDecision::Accepted(payment) => payment,
        AdmissionDecision::Rejected { reason } => {
            return Err(ApiError::PaymentRequired {
                reason: Some(reason),
                challenge: challenge(),
            });
        }
    };

    let result = state
        .engine
        .run_admitted(&request, &payment, requester, admission_started)
        .await?;

    info!(
        strategy = %result.strategy,
        success = result.success,
        tasks = result.results.len(),
        elapsed_ms = result.total_elapsed_ms,
        "Workflow completed"
    );

    Ok(Json(result))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn requester(headers: &HeaderMap) -> ApiResult<Option<AgentId>> {
    header_str(headers, REQUESTER_HEADER)
        .map(|raw| {
            AgentId::parse(raw)
                .map_err(|_| ApiError::InvalidParameter(format!("invalid requester agent '{}'", raw)))
        })
        .transpose()
}
