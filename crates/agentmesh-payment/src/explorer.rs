//! Chain explorer access
//!
//! The gate only needs one read: the settled transaction behind a payment
//! reference. [`ExplorerClient`] is the seam; [`HttpExplorer`] talks to a
//! Hiro-compatible `/extended/v1/tx/{txid}` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ExplorerError, ExplorerResult};

/// Settlement status of a successful transaction
pub const TX_STATUS_SUCCESS: &str = "success";

pub const TX_TYPE_TOKEN_TRANSFER: &str = "token_transfer";
pub const TX_TYPE_CONTRACT_CALL: &str = "contract_call";

/// Transaction record as reported by the explorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorerTransaction {
    #[serde(default)]
    pub tx_id: Option<String>,
    pub tx_status: String,
    pub tx_type: String,
    pub sender_address: String,
    #[serde(default)]
    pub token_transfer: Option<TokenTransferPayload>,
    #[serde(default)]
    pub contract_call: Option<ContractCallPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenTransferPayload {
    pub recipient_address: String,
    /// Decimal string in micro-STX
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractCallPayload {
    pub contract_id: String,
    pub function_name: String,
    #[serde(default)]
    pub function_args: Vec<FunctionArg>,
}

/// Decoded Clarity argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionArg {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub arg_type: String,
    /// Clarity representation, e.g. `u1000` or `'SP...`
    #[serde(default)]
    pub repr: String,
}

impl ContractCallPayload {
    /// Unsigned integer argument by name, parsed from its `u<digits>` repr
    pub fn uint_arg(&self, name: &str) -> Option<u64> {
        self.function_args
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| a.repr.strip_prefix('u'))
            .and_then(|digits| digits.parse().ok())
    }

    /// Principal argument by name, without the leading `'` of its repr
    pub fn principal_arg(&self, name: &str) -> Option<&str> {
        self.function_args
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.repr.strip_prefix('\'').unwrap_or(&a.repr))
    }
}

/// Read access to settled transactions
#[async_trait]
pub trait ExplorerClient: Send + Sync {
    /// Fetch a transaction by normalized id; `Ok(None)` when unknown
    async fn get_transaction(&self, tx_id: &str) -> ExplorerResult<Option<ExplorerTransaction>>;
}

/// Explorer client over HTTP
pub struct HttpExplorer {
    base_url: String,
    client: reqwest::Client,
}

impl HttpExplorer {
    pub fn new(base_url: &str, timeout: Duration) -> ExplorerResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ExplorerClient for HttpExplorer {
    async fn get_transaction(&self, tx_id: &str) -> ExplorerResult<Option<ExplorerTransaction>> {
        let url = format!("{}/extended/v1/tx/{}", self.base_url, tx_id);
        debug!(url = %url, "fetching transaction");

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExplorerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        let tx = serde_json::from_slice(&bytes).map_err(|e| ExplorerError::Decode(e.to_string()))?;
        Ok(Some(tx))
    }
}
