//! In-memory capability store

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use agentmesh_types::{Agent, AgentId, Reputation, TaskId, TaskRecord};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::filter::rank_order;
use crate::{AgentFilter, CapabilityStore, RankedAgent, StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    /// Agent rows with their registration sequence
    agents: HashMap<AgentId, (u64, Agent)>,
    next_seq: u64,
    reputations: HashMap<AgentId, Reputation>,
    tasks: Vec<TaskRecord>,
    task_ids: HashSet<TaskId>,
}

impl Tables {
    fn check_new_agent(&self, agent: &Agent) -> StoreResult<()> {
        if self.agents.contains_key(&agent.id) {
            return Err(StoreError::Duplicate(format!("agent {}", agent.id)));
        }
        Ok(())
    }

    fn check_new_reputation(&self, agent_id: &AgentId) -> StoreResult<()> {
        if self.reputations.contains_key(agent_id) {
            return Err(StoreError::Duplicate(format!("reputation for {}", agent_id)));
        }
        Ok(())
    }

    fn push_agent(&mut self, agent: &Agent) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.agents.insert(agent.id, (seq, agent.clone()));
        seq
    }

    fn check_reputation(&self, expected_total_tasks: u64, reputation: &Reputation) -> StoreResult<()> {
        let current = self
            .reputations
            .get(&reputation.agent_id)
            .ok_or_else(|| StoreError::NotFound(format!("reputation for {}", reputation.agent_id)))?;
        if current.total_tasks != expected_total_tasks {
            return Err(StoreError::Conflict {
                agent_id: reputation.agent_id.to_string(),
                expected: expected_total_tasks,
                actual: current.total_tasks,
            });
        }
        Ok(())
    }

    fn check_task(&self, record: &TaskRecord) -> StoreResult<()> {
        if self.task_ids.contains(&record.id) {
            return Err(StoreError::Duplicate(format!("task record {}", record.id)));
        }
        if !self.agents.contains_key(&record.provider) {
            return Err(StoreError::NotFound(format!("agent {}", record.provider)));
        }
        Ok(())
    }

    fn push_task(&mut self, record: &TaskRecord) {
        self.task_ids.insert(record.id);
        self.tasks.push(record.clone());
    }
}

/// Process-local store; all writes happen under one write lock
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of task records written so far
    pub async fn task_count(&self) -> usize {
        self.tables.read().await.tasks.len()
    }
}

#[async_trait]
impl CapabilityStore for InMemoryStore {
    async fn insert_agent(&self, agent: &Agent) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.check_new_agent(agent)?;
        let seq = tables.push_agent(agent);
        debug!(agent_id = %agent.id, seq, "agent inserted");
        Ok(())
    }

    async fn get_agent(&self, id: &AgentId) -> StoreResult<Option<Agent>> {
        Ok(self.tables.read().await.agents.get(id).map(|(_, a)| a.clone()))
    }

    async fn insert_reputation(&self, reputation: &Reputation) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.agents.contains_key(&reputation.agent_id) {
            return Err(StoreError::NotFound(format!("agent {}", reputation.agent_id)));
        }
        tables.check_new_reputation(&reputation.agent_id)?;
        tables.reputations.insert(reputation.agent_id, reputation.clone());
        Ok(())
    }

    async fn get_reputation(&self, agent_id: &AgentId) -> StoreResult<Option<Reputation>> {
        Ok(self.tables.read().await.reputations.get(agent_id).cloned())
    }

    async fn update_reputation(
        &self,
        expected_total_tasks: u64,
        reputation: &Reputation,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.check_reputation(expected_total_tasks, reputation)?;
        tables.reputations.insert(reputation.agent_id, reputation.clone());
        Ok(())
    }

    async fn query_agents(&self, filter: &AgentFilter) -> StoreResult<Vec<RankedAgent>> {
        let tables = self.tables.read().await;
        let mut matches: Vec<(u64, &Agent, &Reputation)> = tables
            .agents
            .iter()
            .filter_map(|(id, (seq, agent))| {
                let reputation = tables.reputations.get(id)?;
                filter
                    .matches(agent, reputation)
                    .then_some((*seq, agent, reputation))
            })
            .collect();

        matches.sort_by(|a, b| rank_order((a.2, a.0), (b.2, b.0)));

        Ok(matches
            .into_iter()
            .take(filter.effective_limit())
            .map(|(_, agent, reputation)| RankedAgent {
                agent: agent.clone(),
                reputation: reputation.clone(),
            })
            .collect())
    }

    async fn insert_task_record(&self, record: &TaskRecord) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.check_task(record)?;
        tables.push_task(record);
        Ok(())
    }

    async fn commit_outcome(
        &self,
        expected_total_tasks: u64,
        reputation: &Reputation,
        record: &TaskRecord,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        // Validate both halves before touching either
        tables.check_reputation(expected_total_tasks, reputation)?;
        tables.check_task(record)?;
        tables.reputations.insert(reputation.agent_id, reputation.clone());
        tables.push_task(record);
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
        let mut tables = self.tables.write().await;
        tables.check_new_agent(agent)?;
        tables.check_new_reputation(&agent.id)?;
        let seq = tables.push_agent(agent);
        tables.reputations.insert(agent.id, reputation.clone());
        debug!(agent_id = %agent.id, seq, "agent registered");
        Ok(reputation)
    }

    async fn query_tasks(&self, agent_id: &AgentId, limit: usize) -> StoreResult<Vec<TaskRecord>> {
        let tables = self.tables.read().await;
        let mut records: Vec<TaskRecord> = tables
            .tasks
            .iter()
            .rev()
            .filter(|t| t.provider == *agent_id || t.requester == Some(*agent_id))
            .cloned()
            .collect();
        // Stable sort keeps insertion order (newest first) for equal timestamps
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records.truncate(limit);
        Ok(records)
    }
}
