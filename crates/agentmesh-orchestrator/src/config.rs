//! Orchestrator configuration

use std::time::Duration;

use agentmesh_types::PaymentToken;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Nominal reward credited when a task carries no `max_payment`
    #[serde(default = "default_task_reward")]
    pub default_task_reward: u64,
    /// Token used for selection and accounting when the payment shape does not reveal one
    #[serde(default = "default_token")]
    pub default_token: PaymentToken,
    /// Attempts at committing an outcome before a reputation conflict is fatal
    #[serde(default = "default_max_commit_retries")]
    pub max_commit_retries: u32,
    /// Per-request timeout for remote agent calls
    #[serde(default = "default_invoke_timeout")]
    pub invoke_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_task_reward: default_task_reward(),
            default_token: default_token(),
            max_commit_retries: default_max_commit_retries(),
            invoke_timeout_secs: default_invoke_timeout(),
        }
    }
}

impl OrchestratorConfig {
    pub fn invoke_timeout(&self) -> Duration {
        Duration::from_secs(self.invoke_timeout_secs)
    }
}

fn default_task_reward() -> u64 {
    1_000
}

fn default_token() -> PaymentToken {
    PaymentToken::Stx
}

fn default_max_commit_retries() -> u32 {
    8
}

fn default_invoke_timeout() -> u64 {
    30
}
