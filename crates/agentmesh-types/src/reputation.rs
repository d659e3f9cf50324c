//! Reputation rows
//!
//! A reputation row is one-to-one with an agent. The rating is derived from
//! the counters; it is only written directly when the row is seeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AgentId, PaymentToken};

/// Neutral prior every new agent starts from
pub const RATING_SEED: u8 = 50;

/// Upper bound of the rating scale
pub const RATING_MAX: u8 = 100;

/// Trust signal accumulated from an agent's task history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reputation {
    pub agent_id: AgentId,
    pub total_tasks: u64,
    pub successful_tasks: u64,
    pub failed_tasks: u64,
    /// Cumulative earnings in micro-STX
    pub earned_stx: u64,
    /// Cumulative earnings in satoshis
    pub earned_sbtc: u64,
    /// Running mean of response latency
    pub avg_response_time_ms: u64,
    /// Derived score in [0, 100]
    pub rating: u8,
    pub last_active_at: Option<DateTime<Utc>>,
}

impl Reputation {
    /// Fresh row for a newly registered agent
    pub fn seeded(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            total_tasks: 0,
            successful_tasks: 0,
            failed_tasks: 0,
            earned_stx: 0,
            earned_sbtc: 0,
            avg_response_time_ms: 0,
            rating: RATING_SEED,
            last_active_at: None,
        }
    }

    /// Cumulative earnings for one token
    pub fn earned(&self, token: PaymentToken) -> u64 {
        match token {
            PaymentToken::Stx => self.earned_stx,
            PaymentToken::Sbtc => self.earned_sbtc,
        }
    }

    /// Fraction of tasks that succeeded, 0 when no task ran yet
    pub fn success_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            self.successful_tasks as f64 / self.total_tasks as f64
        }
    }
}

/// Result of one invocation, fed into the reputation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub success: bool,
    /// Nominal reward in the token's smallest unit
    pub paid_amount: u64,
    pub token: PaymentToken,
    pub response_time_ms: u64,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_reputation_is_neutral() {
        let rep = Reputation::seeded(AgentId::new());
        assert_eq!(rep.rating, 50);
        assert_eq!(rep.total_tasks, 0);
        assert_eq!(rep.success_rate(), 0.0);
        assert!(rep.last_active_at.is_none());
    }

    #[test]
    fn test_earned_per_token() {
        let mut rep = Reputation::seeded(AgentId::new());
        rep.earned_sbtc = 1_500;
        assert_eq!(rep.earned(PaymentToken::Sbtc), 1_500);
        assert_eq!(rep.earned(PaymentToken::Stx), 0);
    }
}
