//! PostgreSQL capability store

use std::time::Duration;

use agentmesh_types::{Agent, AgentId, Reputation, TaskRecord};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{PgConnection, Postgres, Transaction};
use tracing::{debug, info};

use crate::models::{to_i64, DbAgent, DbRankedAgent, DbReputation, DbTaskRecord};
use crate::{AgentFilter, CapabilityStore, RankedAgent, StoreConfig, StoreError, StoreResult};

const AGENT_COLUMNS: &str = "a.id, a.seq, a.owner_address, a.name, a.description, a.capabilities, \
     a.endpoint, a.accepted_tokens, a.metadata, a.created_at, a.updated_at";

const REPUTATION_COLUMNS: &str = "r.agent_id, r.total_tasks, r.successful_tasks, r.failed_tasks, \
     r.earned_stx, r.earned_sbtc, r.avg_response_time_ms, r.rating, r.last_active_at";

const TASK_COLUMNS: &str = "id, requester, provider, capability, payment_reference, payer, \
     payment_amount, payment_token, status, request_digest, response_digest, started_at, \
     completed_at, error";

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and, if configured, run embedded migrations
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        info!("Connecting to PostgreSQL: {}", config.postgres_url_masked());

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.postgres_url)
            .await
            .map_err(|e| StoreError::Connection(format!("PostgreSQL: {}", e)))?;

        info!("Connected to PostgreSQL");

        let store = Self { pool };
        if config.run_migrations {
            store.migrate().await?;
        }
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        info!("Migrations complete");
        Ok(())
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    async fn write_agent(conn: &mut PgConnection, agent: &Agent) -> StoreResult<()> {
        let capabilities: Vec<String> = agent.capabilities.iter().cloned().collect();
        let tokens: Vec<String> = agent.accepted_tokens.iter().map(|t| t.symbol().to_string()).collect();

        sqlx::query(
            r#"
            INSERT INTO agents (
                id, owner_address, name, description, capabilities, endpoint,
                accepted_tokens, metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(agent.id.as_uuid())
        .bind(&agent.owner_address)
        .bind(&agent.name)
        .bind(&agent.description)
        .bind(capabilities)
        .bind(&agent.endpoint)
        .bind(tokens)
        .bind(serde_json::Value::Object(agent.metadata.clone()))
        .bind(agent.created_at)
        .bind(agent.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_unique(e, || format!("agent {}", agent.id)))?;

        Ok(())
    }

    async fn write_new_reputation(conn: &mut PgConnection, reputation: &Reputation) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reputations (
                agent_id, total_tasks, successful_tasks, failed_tasks, earned_stx,
                earned_sbtc, avg_response_time_ms, rating, last_active_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(reputation.agent_id.as_uuid())
        .bind(to_i64("total_tasks", reputation.total_tasks)?)
        .bind(to_i64("successful_tasks", reputation.successful_tasks)?)
        .bind(to_i64("failed_tasks", reputation.failed_tasks)?)
        .bind(to_i64("earned_stx", reputation.earned_stx)?)
        .bind(to_i64("earned_sbtc", reputation.earned_sbtc)?)
        .bind(to_i64("avg_response_time_ms", reputation.avg_response_time_ms)?)
        .bind(i16::from(reputation.rating))
        .bind(reputation.last_active_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_unique(e, || format!("reputation for {}", reputation.agent_id)))?;

        Ok(())
    }

    async fn write_reputation(
        tx: &mut Transaction<'_, Postgres>,
        expected_total_tasks: u64,
        reputation: &Reputation,
    ) -> StoreResult<()> {
        let current: Option<i64> = sqlx::query_scalar(
            "SELECT total_tasks FROM reputations WHERE agent_id = $1 FOR UPDATE",
        )
        .bind(reputation.agent_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?;

        let current = current
            .ok_or_else(|| StoreError::NotFound(format!("reputation for {}", reputation.agent_id)))?;
        if current != to_i64("total_tasks", expected_total_tasks)? {
            return Err(StoreError::Conflict {
                agent_id: reputation.agent_id.to_string(),
                expected: expected_total_tasks,
                actual: u64::try_from(current).unwrap_or_default(),
            });
        }

        sqlx::query(
            r#"
            UPDATE reputations
            SET total_tasks = $2, successful_tasks = $3, failed_tasks = $4,
                earned_stx = $5, earned_sbtc = $6, avg_response_time_ms = $7,
                rating = $8, last_active_at = $9
            WHERE agent_id = $1
            "#,
        )
        .bind(reputation.agent_id.as_uuid())
        .bind(to_i64("total_tasks", reputation.total_tasks)?)
        .bind(to_i64("successful_tasks", reputation.successful_tasks)?)
        .bind(to_i64("failed_tasks", reputation.failed_tasks)?)
        .bind(to_i64("earned_stx", reputation.earned_stx)?)
        .bind(to_i64("earned_sbtc", reputation.earned_sbtc)?)
        .bind(to_i64("avg_response_time_ms", reputation.avg_response_time_ms)?)
        .bind(i16::from(reputation.rating))
        .bind(reputation.last_active_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn write_task(tx: &mut Transaction<'_, Postgres>, record: &TaskRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO task_records (
                id, requester, provider, capability, payment_reference, payer,
                payment_amount, payment_token, status, request_digest, response_digest,
                started_at, completed_at, error
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.requester.map(|r| *r.as_uuid()))
        .bind(record.provider.as_uuid())
        .bind(&record.capability)
        .bind(&record.payment_reference)
        .bind(&record.payer)
        .bind(to_i64("payment_amount", record.payment_amount)?)
        .bind(record.payment_token.symbol())
        .bind(record.status.as_str())
        .bind(record.request_digest.as_str())
        .bind(record.response_digest.as_ref().map(|d| d.as_str()))
        .bind(record.started_at)
        .bind(record.completed_at)
        .bind(&record.error)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_unique(e, || format!("task record {}", record.id)))?;

        Ok(())
    }
}

/// Map a unique-key violation to `Duplicate`
fn map_unique(err: sqlx::Error, what: impl FnOnce() -> String) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some("23505") {
            return StoreError::Duplicate(what());
        }
    }
    StoreError::Query(err)
}

#[async_trait]
impl CapabilityStore for PgStore {
    async fn insert_agent(&self, agent: &Agent) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::write_agent(&mut conn, agent).await?;
        debug!(agent_id = %agent.id, "agent inserted");
        Ok(())
    }

    async fn get_agent(&self, id: &AgentId) -> StoreResult<Option<Agent>> {
        let row = sqlx::query_as::<_, DbAgent>(&format!(
            "SELECT {} FROM agents a WHERE a.id = $1",
            AGENT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Agent::try_from).transpose()
    }

    async fn insert_reputation(&self, reputation: &Reputation) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::write_new_reputation(&mut conn, reputation).await
    }

    async fn get_reputation(&self, agent_id: &AgentId) -> StoreResult<Option<Reputation>> {
        let row = sqlx::query_as::<_, DbReputation>(&format!(
            "SELECT {} FROM reputations r WHERE r.agent_id = $1",
            REPUTATION_COLUMNS
        ))
        .bind(agent_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Reputation::try_from).transpose()
    }

    async fn update_reputation(
        &self,
        expected_total_tasks: u64,
        reputation: &Reputation,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::write_reputation(&mut tx, expected_total_tasks, reputation).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn query_agents(&self, filter: &AgentFilter) -> StoreResult<Vec<RankedAgent>> {
        let limit = i64::try_from(filter.effective_limit()).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, DbRankedAgent>(&format!(
            r#"
            SELECT {}, {}
            FROM agents a
            JOIN reputations r ON r.agent_id = a.id
            WHERE ($1::text IS NULL OR $1 = ANY(a.capabilities))
              AND ($2::text IS NULL OR $2 = ANY(a.accepted_tokens))
              AND r.rating >= $3
            ORDER BY r.rating DESC, r.successful_tasks DESC, a.seq ASC
            LIMIT $4
            "#,
            AGENT_COLUMNS, REPUTATION_COLUMNS
        ))
        .bind(filter.capability.as_deref())
        .bind(filter.token.map(|t| t.symbol()))
        .bind(i16::from(filter.effective_min_rating()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RankedAgent::try_from).collect()
    }

    async fn insert_task_record(&self, record: &TaskRecord) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::write_task(&mut tx, record).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn commit_outcome(
        &self,
        expected_total_tasks: u64,
        reputation: &Reputation,
        record: &TaskRecord,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::write_reputation(&mut tx, expected_total_tasks, reputation).await?;
        Self::write_task(&mut tx, record).await?;
        tx.commit().await?;

        debug!(
            agent_id = %reputation.agent_id,
            task_id = %record.id,
            total_tasks = reputation.total_tasks,
            rating = reputation.rating,
            "outcome committed"
        );
        Ok(())
    }

    async fn register_agent(&self, agent: &Agent) -> StoreResult<Reputation> {
        let reputation = Reputation::seeded(agent.id);
        let mut tx = self.pool.begin().await?;
        Self::write_agent(&mut tx, agent).await?;
        Self::write_new_reputation(&mut tx, &reputation).await?;
        tx.commit().await?;

        debug!(agent_id = %agent.id, "agent registered");
        Ok(reputation)
    }

    async fn query_tasks(&self, agent_id: &AgentId, limit: usize) -> StoreResult<Vec<TaskRecord>> {
        let rows = sqlx::query_as::<_, DbTaskRecord>(&format!(
            r#"
            SELECT {}
            FROM task_records
            WHERE provider = $1 OR requester = $1
            ORDER BY started_at DESC
            LIMIT $2
            "#,
            TASK_COLUMNS
        ))
        .bind(agent_id.as_uuid())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TaskRecord::try_from).collect()
    }
}
