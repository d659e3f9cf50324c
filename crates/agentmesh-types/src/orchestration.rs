//! Orchestration request and result types
//!
//! These structures are ephemeral: they live for the duration of one
//! workflow and are never persisted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{MeshError, PaymentToken, Result, TaskId};

/// Reserved input key carrying the previous task's output in sequential runs
pub const PREVIOUS_RESULT_KEY: &str = "previous_result";

/// Agent id reported when no agent matched a capability
pub const NO_AGENT: &str = "none";

/// Capability reported on the synthetic result of a rejected admission
pub const PAYMENT_CAPABILITY: &str = "payment";

/// How the tasks of a workflow are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One at a time, feeding each output into the next input
    Sequential,
    /// All at once, no data dependencies
    Parallel,
    /// Only the first task, on the best ranked agent
    BestAgent,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::BestAgent => "best_agent",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = MeshError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            "best_agent" => Ok(Self::BestAgent),
            _ => Err(MeshError::UnknownStrategy {
                value: s.to_string(),
            }),
        }
    }
}

/// One requested task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub capability: String,
    #[serde(default)]
    pub input: serde_json::Value,
    /// Payment ceiling in the token's smallest unit
    #[serde(default)]
    pub max_payment: Option<u64>,
}

impl TaskRequest {
    pub fn new(capability: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            capability: capability.into(),
            input,
            max_payment: None,
        }
    }

    pub fn with_max_payment(mut self, max_payment: u64) -> Self {
        self.max_payment = Some(max_payment);
        self
    }
}

/// A workflow: ordered tasks plus a strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationRequest {
    pub tasks: Vec<TaskRequest>,
    pub strategy: Strategy,
}

impl OrchestrationRequest {
    pub fn new(strategy: Strategy, tasks: Vec<TaskRequest>) -> Self {
        Self { tasks, strategy }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tasks.is_empty() {
            return Err(MeshError::InvalidRequest {
                reason: "at least one task is required".to_string(),
            });
        }
        if let Some(task) = self.tasks.iter().find(|t| t.capability.trim().is_empty()) {
            return Err(MeshError::InvalidRequest {
                reason: format!("task capability must not be blank (got '{}')", task.capability),
            });
        }
        Ok(())
    }
}

/// Outcome of one task within a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub capability: String,
    /// Selected agent, or [`NO_AGENT`]
    pub agent_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
    /// Audit record written for this task, if it was attempted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
}

impl TaskResult {
    pub fn succeeded(
        capability: impl Into<String>,
        agent_id: impl Into<String>,
        output: serde_json::Value,
        latency_ms: u64,
        task_id: TaskId,
    ) -> Self {
        Self {
            capability: capability.into(),
            agent_id: agent_id.into(),
            success: true,
            output: Some(output),
            error: None,
            latency_ms,
            task_id: Some(task_id),
        }
    }

    pub fn failed(
        capability: impl Into<String>,
        agent_id: impl Into<String>,
        error: impl Into<String>,
        latency_ms: u64,
        task_id: Option<TaskId>,
    ) -> Self {
        Self {
            capability: capability.into(),
            agent_id: agent_id.into(),
            success: false,
            output: None,
            error: Some(error.into()),
            latency_ms,
            task_id,
        }
    }

    /// Result for a task no agent could be selected for
    pub fn unmatched(capability: impl Into<String>) -> Self {
        let capability = capability.into();
        let error = format!("no agent found for capability '{}'", capability);
        Self::failed(capability, NO_AGENT, error, 0, None)
    }

    /// Synthetic result for a workflow whose payment was rejected
    pub fn admission_rejected(reason: impl Into<String>) -> Self {
        Self::failed(
            PAYMENT_CAPABILITY,
            NO_AGENT,
            format!("payment rejected: {}", reason.into()),
            0,
            None,
        )
    }
}

/// Aggregated outcome of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub success: bool,
    pub strategy: Strategy,
    pub results: Vec<TaskResult>,
    pub total_elapsed_ms: u64,
    /// Principal that paid for the workflow, when admitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_token: Option<PaymentToken>,
}

impl OrchestrationResult {
    /// Overall success iff every per-task result succeeded
    pub fn aggregate(
        strategy: Strategy,
        results: Vec<TaskResult>,
        total_elapsed_ms: u64,
        payer: Option<String>,
        payment_token: Option<PaymentToken>,
    ) -> Self {
        let success = !results.is_empty() && results.iter().all(|r| r.success);
        Self {
            success,
            strategy,
            results,
            total_elapsed_ms,
            payer,
            payment_token,
        }
    }

    pub fn failed_tasks(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}
