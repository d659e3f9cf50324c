//! Agent selection

use std::sync::Arc;

use agentmesh_store::{AgentFilter, CapabilityStore, RankedAgent, StoreResult};
use agentmesh_types::{Agent, PaymentToken};
use tracing::debug;

/// Ranked discovery over the capability store
#[derive(Clone)]
pub struct AgentSelector {
    store: Arc<dyn CapabilityStore>,
}

impl AgentSelector {
    pub fn new(store: Arc<dyn CapabilityStore>) -> Self {
        Self { store }
    }

    /// Agents matching the filter, highest rating first
    pub async fn discover(&self, filter: &AgentFilter) -> StoreResult<Vec<RankedAgent>> {
        self.store.query_agents(filter).await
    }

    /// Top-ranked agent offering `capability` and accepting `token`
    pub async fn find_best(&self, capability: &str, token: PaymentToken) -> StoreResult<Option<Agent>> {
        let filter = AgentFilter::new()
            .capability(capability)
            .token(token)
            .min_rating(0)
            .limit(1);
        let best = self.discover(&filter).await?.into_iter().next();
        debug!(
            capability,
            token = %token,
            agent_id = ?best.as_ref().map(|r| r.agent.id),
            "selected agent"
        );
        Ok(best.map(|r| r.agent))
    }
}
