//! AgentMesh Capability Store
//!
//! Durable home of agent identity rows, reputation rows and task audit
//! records. The orchestration core only talks to the narrow
//! [`CapabilityStore`] trait; two adapters are provided:
//!
//! - [`InMemoryStore`]: process-local tables behind an async lock, used by
//!   tests and single-node deployments.
//! - [`PgStore`]: PostgreSQL via SQLx with embedded migrations.
//!
//! # Atomicity
//!
//! Reputation rows are updated with optimistic concurrency: writers pass the
//! `total_tasks` value they read, and the store rejects the write with
//! [`StoreError::Conflict`] if the row moved in the meantime.
//! [`CapabilityStore::commit_outcome`] applies a reputation update and the
//! matching task record as one atomic pair, and
//! [`CapabilityStore::register_agent`] writes an agent with its seeded
//! reputation the same way.

pub mod config;
pub mod error;
pub mod filter;
pub mod memory;
pub mod postgres;
mod models;

use agentmesh_types::{Agent, AgentId, Reputation, TaskRecord};
use async_trait::async_trait;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use filter::{AgentFilter, RankedAgent, DEFAULT_LIMIT, MAX_LIMIT};
pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Persistence interface consumed by the coordination core
#[async_trait]
pub trait CapabilityStore: Send + Sync {
    /// Insert a new agent; fails with `Duplicate` if the id exists
    async fn insert_agent(&self, agent: &Agent) -> StoreResult<()>;

    async fn get_agent(&self, id: &AgentId) -> StoreResult<Option<Agent>>;

    /// Insert the reputation row of an existing agent
    async fn insert_reputation(&self, reputation: &Reputation) -> StoreResult<()>;

    async fn get_reputation(&self, agent_id: &AgentId) -> StoreResult<Option<Reputation>>;

    /// Replace a reputation row if its `total_tasks` still equals `expected_total_tasks`
    async fn update_reputation(
        &self,
        expected_total_tasks: u64,
        reputation: &Reputation,
    ) -> StoreResult<()>;

    /// Agents matching the filter, in discovery order
    async fn query_agents(&self, filter: &AgentFilter) -> StoreResult<Vec<RankedAgent>>;

    /// Append a task record; fails with `Duplicate` if the id exists
    async fn insert_task_record(&self, record: &TaskRecord) -> StoreResult<()>;

    /// Atomically apply a reputation update and append its task record
    async fn commit_outcome(
        &self,
        expected_total_tasks: u64,
        reputation: &Reputation,
        record: &TaskRecord,
    ) -> StoreResult<()>;

    /// Task records where the agent was provider or requester, newest first
    async fn query_tasks(&self, agent_id: &AgentId, limit: usize) -> StoreResult<Vec<TaskRecord>>;

    /// Atomically insert an agent together with its seeded reputation row.
    /// On error neither row is written.
    async fn register_agent(&self, agent: &Agent) -> StoreResult<Reputation>;
}
