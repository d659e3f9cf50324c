//! Agent identity records
//!
//! An agent advertises a non-empty set of capabilities, a callable base
//! endpoint and the payment tokens it accepts.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AgentId, MeshError, PaymentToken, Result};

/// Registered service agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Immutable identifier
    pub id: AgentId,
    /// Principal that owns the agent
    pub owner_address: String,
    /// Display name
    pub name: String,
    /// Free text description
    #[serde(default)]
    pub description: Option<String>,
    /// Capabilities the agent claims to provide
    pub capabilities: BTreeSet<String>,
    /// Base URL the agent is invoked at
    pub endpoint: String,
    /// Tokens the agent accepts
    pub accepted_tokens: BTreeSet<PaymentToken>,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// Exact membership in the capability set
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// Exact membership in the accepted token set
    pub fn accepts(&self, token: PaymentToken) -> bool {
        self.accepted_tokens.contains(&token)
    }

    /// URL a capability is invoked at: `{endpoint}/{capability}`
    pub fn capability_url(&self, capability: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), capability)
    }
}

/// Request to register a new agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub owner_address: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub capabilities: Vec<String>,
    pub endpoint: String,
    pub accepted_tokens: Vec<PaymentToken>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl AgentRegistration {
    /// Validate the registration and build an agent with a fresh identifier
    pub fn into_agent(self) -> Result<Agent> {
        if self.owner_address.trim().is_empty() {
            return Err(invalid("owner address must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }

        let mut capabilities = BTreeSet::new();
        for capability in &self.capabilities {
            let capability = capability.trim();
            if capability.is_empty() {
                return Err(invalid("capabilities must not be blank"));
            }
            capabilities.insert(capability.to_string());
        }
        if capabilities.is_empty() {
            return Err(invalid("at least one capability is required"));
        }

        let accepted_tokens: BTreeSet<PaymentToken> = self.accepted_tokens.into_iter().collect();
        if accepted_tokens.is_empty() {
            return Err(invalid("at least one accepted token is required"));
        }

        let endpoint = self.endpoint.trim().trim_end_matches('/').to_string();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(invalid("endpoint must be an http(s) URL"));
        }

        let now = Utc::now();
        Ok(Agent {
            id: AgentId::new(),
            owner_address: self.owner_address.trim().to_string(),
            name: self.name.trim().to_string(),
            description: self.description,
            capabilities,
            endpoint,
            accepted_tokens,
            metadata: self.metadata,
            created_at: now,
            updated_at: now,
        })
    }
}

fn invalid(reason: &str) -> MeshError {
    MeshError::InvalidRegistration {
        reason: reason.to_string(),
    }
}
