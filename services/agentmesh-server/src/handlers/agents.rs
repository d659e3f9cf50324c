//! Agent registry and discovery handlers

use agentmesh_store::{AgentFilter, RankedAgent};
use agentmesh_types::{Agent, AgentId, AgentRegistration, PaymentToken, Reputation, TaskRecord};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Discovery query parameters
#[derive(Debug, Default, Deserialize)]
pub struct DiscoverQuery {
    pub capability: Option<String>,
    /// Token symbol, case-insensitive
    pub token: Option<String>,
    pub min_rating: Option<u8>,
    pub limit: Option<usize>,
}

impl DiscoverQuery {
    fn into_filter(self) -> ApiResult<AgentFilter> {
        let token = self
            .token
            .as_deref()
            .map(str::parse::<PaymentToken>)
            .transpose()?;
        Ok(AgentFilter {
            capability: self.capability,
            token,
            min_rating: self.min_rating,
            limit: self.limit,
        })
    }
}

/// Agent with its reputation and latest task records
#[derive(Debug, Serialize)]
pub struct AgentDetail {
    pub agent: Agent,
    pub reputation: Reputation,
    pub recent_tasks: Vec<TaskRecord>,
}

/// `POST /api/v1/agents`
pub async fn register_agent(
    State(state): State<AppState>,
    Json(registration): Json<AgentRegistration>,
) -> ApiResult<(StatusCode, Json<RankedAgent>)> {
    let agent = registration.into_agent()?;
    let reputation = state.store.register_agent(&agent).await?;

    info!(
        agent_id = %agent.id,
        owner = %agent.owner_address,
        capabilities = ?agent.capabilities,
        "Agent registered"
    );

    Ok((StatusCode::CREATED, Json(RankedAgent { agent, reputation })))
}

/// `GET /api/v1/agents`
pub async fn list_agents(
    State(state): State<AppState>,
    Query(query): Query<DiscoverQuery>,
) -> ApiResult<Json<Vec<RankedAgent>>> {
    let filter = query.into_filter()?;
    let agents = state.engine.selector().discover(&filter).await?;
    Ok(Json(agents))
}

/// `GET /api/v1/agents/:id`
pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AgentDetail>> {
    let agent_id = AgentId::parse(&id)
        .map_err(|_| ApiError::InvalidParameter(format!("invalid agent id '{}'", id)))?;

    let agent = state
        .store
        .get_agent(&agent_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("agent {}", agent_id)))?;
    let reputation = state
        .store
        .get_reputation(&agent_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("reputation for {}", agent_id)))?;
    let recent_tasks = state.store.query_tasks(&agent_id, state.recent_tasks).await?;

    Ok(Json(AgentDetail {
        agent,
        reputation,
        recent_tasks,
    }))
}
