//! Payment gate configuration

use std::time::Duration;

use agentmesh_types::PaymentToken;
use serde::{Deserialize, Serialize};

/// Explorer endpoint, accepted payment shapes and per-token prices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Base URL of the chain explorer API
    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,
    /// Network name advertised in payment challenges
    #[serde(default = "default_network")]
    pub network: String,
    /// Principal that must receive primary-token transfers
    #[serde(default)]
    pub payment_recipient: String,
    /// Contract whose calls count as payment
    #[serde(default)]
    pub payment_contract: String,
    /// Wrapped-asset token contract; its `transfer` calls count as payment
    #[serde(default = "default_wrapped_asset_contract")]
    pub wrapped_asset_contract: String,
    /// Workflow price in micro-STX
    #[serde(default = "default_price_stx")]
    pub price_stx: u64,
    /// Workflow price in satoshis
    #[serde(default = "default_price_sbtc")]
    pub price_sbtc: u64,
    /// Lifetime of an issued payment challenge
    #[serde(default = "default_challenge_ttl")]
    pub challenge_ttl_secs: u64,
    /// Cache accepted admissions for this long; disabled when unset
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
    /// Explorer request timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            explorer_url: default_explorer_url(),
            network: default_network(),
            payment_recipient: String::new(),
            payment_contract: String::new(),
            wrapped_asset_contract: default_wrapped_asset_contract(),
            price_stx: default_price_stx(),
            price_sbtc: default_price_sbtc(),
            challenge_ttl_secs: default_challenge_ttl(),
            cache_ttl_secs: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl PaymentConfig {
    /// Price of one workflow in the token's smallest unit
    pub fn price(&self, token: PaymentToken) -> u64 {
        match token {
            PaymentToken::Stx => self.price_stx,
            PaymentToken::Sbtc => self.price_sbtc,
        }
    }

    pub fn challenge_ttl(&self) -> Duration {
        Duration::from_secs(self.challenge_ttl_secs)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_explorer_url() -> String {
    "https://api.hiro.so".to_string()
}

fn default_network() -> String {
    "mainnet".to_string()
}

fn default_wrapped_asset_contract() -> String {
    "SM3VDXK3WZZSA84XXFKAFAF15NNZX32CTSG82JFQ4.sbtc-token".to_string()
}

fn default_price_stx() -> u64 {
    1_000_000
}

fn default_price_sbtc() -> u64 {
    1_000
}

fn default_challenge_ttl() -> u64 {
    300
}

fn default_request_timeout() -> u64 {
    10
}
