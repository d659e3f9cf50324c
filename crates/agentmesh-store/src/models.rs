//! Row models - mapped from PostgreSQL tables

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use agentmesh_types::{
    Agent, AgentId, ContentDigest, PaymentToken, Reputation, TaskId, TaskRecord, TaskStatus,
};

use crate::{RankedAgent, StoreError, StoreResult};

// ============================================================================
// Agent Models
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct DbAgent {
    pub id: Uuid,
    pub seq: i64,
    pub owner_address: String,
    pub name: String,
    pub description: Option<String>,
    pub capabilities: Vec<String>,
    pub endpoint: String,
    pub accepted_tokens: Vec<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbAgent> for Agent {
    type Error = StoreError;

    fn try_from(row: DbAgent) -> StoreResult<Self> {
        let accepted_tokens = row
            .accepted_tokens
            .iter()
            .map(|t| t.parse::<PaymentToken>())
            .collect::<Result<_, _>>()?;
        let metadata = match row.metadata {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                return Err(StoreError::InvalidData(format!(
                    "agent {} metadata is not an object: {}",
                    row.id, other
                )))
            }
        };

        Ok(Agent {
            id: AgentId::from_uuid(row.id),
            owner_address: row.owner_address,
            name: row.name,
            description: row.description,
            capabilities: row.capabilities.into_iter().collect(),
            endpoint: row.endpoint,
            accepted_tokens,
            metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ============================================================================
// Reputation Models
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct DbReputation {
    pub agent_id: Uuid,
    pub total_tasks: i64,
    pub successful_tasks: i64,
    pub failed_tasks: i64,
    pub earned_stx: i64,
    pub earned_sbtc: i64,
    pub avg_response_time_ms: i64,
    pub rating: i16,
    pub last_active_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbReputation> for Reputation {
    type Error = StoreError;

    fn try_from(row: DbReputation) -> StoreResult<Self> {
        Ok(Reputation {
            agent_id: AgentId::from_uuid(row.agent_id),
            total_tasks: to_u64("total_tasks", row.total_tasks)?,
            successful_tasks: to_u64("successful_tasks", row.successful_tasks)?,
            failed_tasks: to_u64("failed_tasks", row.failed_tasks)?,
            earned_stx: to_u64("earned_stx", row.earned_stx)?,
            earned_sbtc: to_u64("earned_sbtc", row.earned_sbtc)?,
            avg_response_time_ms: to_u64("avg_response_time_ms", row.avg_response_time_ms)?,
            rating: u8::try_from(row.rating)
                .map_err(|_| StoreError::InvalidData(format!("rating out of range: {}", row.rating)))?,
            last_active_at: row.last_active_at,
        })
    }
}

/// Agent row joined with its reputation row
#[derive(Debug, Clone, FromRow)]
pub struct DbRankedAgent {
    #[sqlx(flatten)]
    pub agent: DbAgent,
    #[sqlx(flatten)]
    pub reputation: DbReputation,
}

impl TryFrom<DbRankedAgent> for RankedAgent {
    type Error = StoreError;

    fn try_from(row: DbRankedAgent) -> StoreResult<Self> {
        Ok(RankedAgent {
            agent: row.agent.try_into()?,
            reputation: row.reputation.try_into()?,
        })
    }
}

// ============================================================================
// Task Models
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct DbTaskRecord {
    pub id: Uuid,
    pub requester: Option<Uuid>,
    pub provider: Uuid,
    pub capability: String,
    pub payment_reference: String,
    pub payer: Option<String>,
    pub payment_amount: i64,
    pub payment_token: String,
    pub status: String,
    pub request_digest: String,
    pub response_digest: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl TryFrom<DbTaskRecord> for TaskRecord {
    type Error = StoreError;

    fn try_from(row: DbTaskRecord) -> StoreResult<Self> {
        Ok(TaskRecord {
            id: TaskId::from_uuid(row.id),
            requester: row.requester.map(AgentId::from_uuid),
            provider: AgentId::from_uuid(row.provider),
            capability: row.capability,
            payment_reference: row.payment_reference,
            payer: row.payer,
            payment_amount: to_u64("payment_amount", row.payment_amount)?,
            payment_token: row.payment_token.parse()?,
            status: row.status.parse::<TaskStatus>()?,
            request_digest: ContentDigest(row.request_digest),
            response_digest: row.response_digest.map(ContentDigest),
            started_at: row.started_at,
            completed_at: row.completed_at,
            error: row.error,
        })
    }
}

// ============================================================================
// Conversions
// ============================================================================

pub(crate) fn to_u64(column: &str, value: i64) -> StoreResult<u64> {
    u64::try_from(value)
        .map_err(|_| StoreError::InvalidData(format!("{} is negative: {}", column, value)))
}

pub(crate) fn to_i64(column: &str, value: u64) -> StoreResult<i64> {
    i64::try_from(value)
        .map_err(|_| StoreError::InvalidData(format!("{} exceeds BIGINT: {}", column, value)))
}
