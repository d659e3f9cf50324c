//! Outcome recording
//!
//! Applies a task outcome to the provider's reputation and appends the task
//! record in one store commit. The commit is compare-and-swap on the
//! reputation row's `total_tasks`; a lost race re-reads and retries.

use std::sync::Arc;

use agentmesh_store::{CapabilityStore, StoreError};
use agentmesh_types::{AgentId, Reputation, TaskOutcome, TaskRecord};
use tracing::{debug, warn};

use crate::{EngineResult, OrchestrationError};

#[derive(Clone)]
pub struct OutcomeRecorder {
    store: Arc<dyn CapabilityStore>,
    max_attempts: u32,
}

impl OutcomeRecorder {
    pub fn new(store: Arc<dyn CapabilityStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Commit `outcome` for `provider` together with its finalized record
    pub async fn record(
        &self,
        provider: &AgentId,
        outcome: &TaskOutcome,
        record: &TaskRecord,
    ) -> EngineResult<Reputation> {
        for attempt in 1..=self.max_attempts {
            let current = self
                .store
                .get_reputation(provider)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("reputation for {}", provider)))?;
            let next = agentmesh_reputation::update(&current, outcome);

            match self
                .store
                .commit_outcome(current.total_tasks, &next, record)
                .await
            {
                Ok(()) => {
                    debug!(
                        agent_id = %provider,
                        task_id = %record.id,
                        rating = next.rating,
                        attempt,
                        "reputation updated"
                    );
                    return Ok(next);
                }
                Err(e) if e.is_conflict() => {
                    warn!(agent_id = %provider, attempt, "reputation commit lost a race, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(OrchestrationError::CommitContention {
            agent_id: provider.to_string(),
            attempts: self.max_attempts,
        })
    }
}
