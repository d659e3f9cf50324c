//! Agent query filter and ranking

use std::cmp::Ordering;

use agentmesh_types::{Agent, PaymentToken, Reputation};
use serde::{Deserialize, Serialize};

/// Default number of agents returned by a query
pub const DEFAULT_LIMIT: usize = 20;

/// Hard cap on the number of agents returned by a query
pub const MAX_LIMIT: usize = 100;

/// Discovery filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentFilter {
    /// Exact membership in the capability set
    #[serde(default)]
    pub capability: Option<String>,
    /// Exact membership in the accepted token set
    #[serde(default)]
    pub token: Option<PaymentToken>,
    /// Inclusive lower bound on rating
    #[serde(default)]
    pub min_rating: Option<u8>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl AgentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = Some(capability.into());
        self
    }

    pub fn token(mut self, token: PaymentToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn min_rating(mut self, min_rating: u8) -> Self {
        self.min_rating = Some(min_rating);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Limit clamped to [1, MAX_LIMIT]
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn effective_min_rating(&self) -> u8 {
        self.min_rating.unwrap_or(0)
    }

    pub fn matches(&self, agent: &Agent, reputation: &Reputation) -> bool {
        if let Some(capability) = &self.capability {
            if !agent.has_capability(capability) {
                return false;
            }
        }
        if let Some(token) = self.token {
            if !agent.accepts(token) {
                return false;
            }
        }
        reputation.rating >= self.effective_min_rating()
    }
}

/// An agent together with its current reputation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedAgent {
    pub agent: Agent,
    pub reputation: Reputation,
}

/// Discovery order: rating desc, successful tasks desc, registration order asc
pub fn rank_order(a: (&Reputation, u64), b: (&Reputation, u64)) -> Ordering {
    b.0.rating
        .cmp(&a.0.rating)
        .then_with(|| b.0.successful_tasks.cmp(&a.0.successful_tasks))
        .then_with(|| a.1.cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentmesh_types::AgentId;

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(AgentFilter::new().effective_limit(), DEFAULT_LIMIT);
        assert_eq!(AgentFilter::new().limit(0).effective_limit(), 1);
        assert_eq!(AgentFilter::new().limit(10_000).effective_limit(), MAX_LIMIT);
    }

    #[test]
    fn test_rank_order_breaks_ties() {
        let mut high = Reputation::seeded(AgentId::new());
        high.rating = 80;
        let mut busy = Reputation::seeded(AgentId::new());
        busy.rating = 60;
        busy.successful_tasks = 9;
        let mut idle = Reputation::seeded(AgentId::new());
        idle.rating = 60;
        idle.successful_tasks = 1;

        assert_eq!(rank_order((&high, 5), (&busy, 1)), Ordering::Less);
        assert_eq!(rank_order((&busy, 5), (&idle, 1)), Ordering::Less);
        assert_eq!(rank_order((&idle, 1), (&idle.clone(), 2)), Ordering::Less);
    }
}
