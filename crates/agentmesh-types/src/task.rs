//! Task audit records
//!
//! A task record is written for every attempted invocation. Once it leaves
//! `pending` it is immutable.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{AgentId, MeshError, PaymentToken, Result, TaskId};

/// Lifecycle status of a task record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = MeshError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(MeshError::UnknownTaskStatus {
                value: s.to_string(),
            }),
        }
    }
}

/// SHA-256 hex digest of a JSON payload.
///
/// The payload is serialized with sorted object keys, so equal payloads
/// always produce equal digests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(pub String);

impl ContentDigest {
    pub fn of_value(value: &serde_json::Value) -> Self {
        Self::of_bytes(canonicalize(value).to_string().as_bytes())
    }

    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Rebuild objects with keys inserted in sorted order; the map type may keep
// insertion order when serde_json's `preserve_order` is enabled downstream.
fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key.as_str()]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Audit entry for one agent invocation within a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    /// Requesting agent, `None` for external callers
    pub requester: Option<AgentId>,
    pub provider: AgentId,
    pub capability: String,
    pub payment_reference: String,
    /// Principal that settled the workflow payment
    pub payer: Option<String>,
    pub payment_amount: u64,
    pub payment_token: PaymentToken,
    pub status: TaskStatus,
    pub request_digest: ContentDigest,
    pub response_digest: Option<ContentDigest>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Invocation context shared by every record of one workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentContext {
    pub reference: String,
    pub payer: Option<String>,
    pub token: PaymentToken,
}

impl TaskRecord {
    /// Open a pending record for an invocation that is about to start
    pub fn pending(
        requester: Option<AgentId>,
        provider: AgentId,
        capability: impl Into<String>,
        payment: &PaymentContext,
        payment_amount: u64,
        request: &serde_json::Value,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TaskId::new(),
            requester,
            provider,
            capability: capability.into(),
            payment_reference: payment.reference.clone(),
            payer: payment.payer.clone(),
            payment_amount,
            payment_token: payment.token,
            status: TaskStatus::Pending,
            request_digest: ContentDigest::of_value(request),
            response_digest: None,
            started_at,
            completed_at: None,
            error: None,
        }
    }

    /// Mark the record completed with the agent's response
    pub fn complete(&mut self, response: &serde_json::Value, at: DateTime<Utc>) -> Result<()> {
        self.ensure_pending()?;
        self.status = TaskStatus::Completed;
        self.response_digest = Some(ContentDigest::of_value(response));
        self.completed_at = Some(at);
        Ok(())
    }

    /// Mark the record failed
    pub fn fail(&mut self, error: impl Into<String>, at: DateTime<Utc>) -> Result<()> {
        self.ensure_pending()?;
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(at);
        Ok(())
    }

    fn ensure_pending(&self) -> Result<()> {
        if self.status.is_final() {
            return Err(MeshError::TaskAlreadyFinal {
                task_id: self.id.to_string(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }
}
