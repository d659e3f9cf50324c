//! Payment-required challenge

use agentmesh_types::PaymentToken;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::PaymentConfig;

/// Instructions returned to a caller that has not paid yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentChallenge {
    pub resource: String,
    /// Required amount in the token's smallest unit
    pub amount: u64,
    pub token: PaymentToken,
    /// Destination principal
    pub pay_to: String,
    pub network: String,
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
}

impl PaymentChallenge {
    pub fn for_resource(config: &PaymentConfig, resource: impl Into<String>, token: PaymentToken) -> Self {
        let ttl = chrono::Duration::from_std(config.challenge_ttl())
            .unwrap_or_else(|_| chrono::Duration::days(1));
        Self {
            resource: resource.into(),
            amount: config.price(token),
            token,
            pay_to: config.payment_recipient.clone(),
            network: config.network.clone(),
            nonce: Uuid::new_v4().simple().to_string(),
            expires_at: Utc::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
