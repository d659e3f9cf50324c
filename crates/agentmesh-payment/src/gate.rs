//! Payment admission
//!
//! A workflow is admitted only when its payment reference resolves to a
//! settled transaction of an accepted shape:
//!
//! | Shape | Condition | Token |
//! |---|---|---|
//! | `token_transfer` | recipient is the configured payment recipient | STX |
//! | `contract_call` | contract is the configured payment contract | not detected |
//! | `contract_call` `transfer` | contract is the wrapped-asset contract | sBTC |
//!
//! The decision itself is the pure function [`evaluate`]; [`PaymentGate`]
//! adds normalization, the explorer fetch and the optional admission cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use agentmesh_types::PaymentToken;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::explorer::{TX_STATUS_SUCCESS, TX_TYPE_CONTRACT_CALL, TX_TYPE_TOKEN_TRANSFER};
use crate::{ExplorerClient, ExplorerTransaction, PaymentConfig};

pub const REASON_INVALID_REFERENCE: &str = "invalid payment reference";
pub const REASON_NOT_FOUND: &str = "not found";
pub const REASON_SHAPE_MISMATCH: &str = "transaction is not an accepted payment";

const TX_ID_HEX_LEN: usize = 64;

/// A verified payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmittedPayment {
    /// Normalized transaction id
    pub reference: String,
    /// Transaction sender
    pub payer: String,
    pub token: Option<PaymentToken>,
    /// Transferred amount in the token's smallest unit, when exposed
    pub amount: Option<u64>,
}

/// Outcome of an admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    Accepted(AdmittedPayment),
    Rejected { reason: String },
}

impl AdmissionDecision {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Normalize a payment reference to `0x` + 64 lowercase hex digits.
///
/// Accepts the prefixed form in either case and the bare hex form, with
/// surrounding whitespace.
pub fn normalize_reference(reference: &str) -> Option<String> {
    let lowered = reference.trim().to_ascii_lowercase();
    let hex = lowered.strip_prefix("0x").unwrap_or(&lowered);
    if hex.len() != TX_ID_HEX_LEN || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{}", hex))
}

/// Decide admission for a fetched transaction
pub fn evaluate(reference: &str, tx: &ExplorerTransaction, config: &PaymentConfig) -> AdmissionDecision {
    if tx.tx_status != TX_STATUS_SUCCESS {
        return AdmissionDecision::rejected(format!("transaction status is '{}'", tx.tx_status));
    }

    let admitted = |token: Option<PaymentToken>, amount: Option<u64>| {
        AdmissionDecision::Accepted(AdmittedPayment {
            reference: reference.to_string(),
            payer: tx.sender_address.clone(),
            token,
            amount,
        })
    };

    match tx.tx_type.as_str() {
        TX_TYPE_TOKEN_TRANSFER => match &tx.token_transfer {
            Some(transfer) if transfer.recipient_address == config.payment_recipient => {
                admitted(Some(PaymentToken::Stx), transfer.amount.parse().ok())
            }
            _ => AdmissionDecision::rejected(REASON_SHAPE_MISMATCH),
        },
        TX_TYPE_CONTRACT_CALL => match &tx.contract_call {
            Some(call) if call.contract_id == config.payment_contract => {
                admitted(None, call.uint_arg("amount"))
            }
            Some(call)
                if call.contract_id == config.wrapped_asset_contract
                    && call.function_name == "transfer"
                    && call.principal_arg("recipient") == Some(config.payment_recipient.as_str()) =>
            {
                admitted(Some(PaymentToken::Sbtc), call.uint_arg("amount"))
            }
            _ => AdmissionDecision::rejected(REASON_SHAPE_MISMATCH),
        },
        _ => AdmissionDecision::rejected(REASON_SHAPE_MISMATCH),
    }
}

/// Verifies payment references against the explorer
pub struct PaymentGate {
    explorer: Arc<dyn ExplorerClient>,
    config: PaymentConfig,
    cache: Option<AdmissionCache>,
}

struct AdmissionCache {
    ttl: Duration,
    entries: DashMap<String, (AdmittedPayment, Instant)>,
}

impl AdmissionCache {
    fn get(&self, reference: &str) -> Option<AdmittedPayment> {
        let hit = self.entries.get(reference).and_then(|entry| {
            let (payment, at) = entry.value();
            (at.elapsed() < self.ttl).then(|| payment.clone())
        });
        if hit.is_none() {
            self.entries.remove(reference);
        }
        hit
    }
}

impl PaymentGate {
    pub fn new(explorer: Arc<dyn ExplorerClient>, config: PaymentConfig) -> Self {
        let cache = config.cache_ttl().map(|ttl| AdmissionCache {
            ttl,
            entries: DashMap::new(),
        });
        Self {
            explorer,
            config,
            cache,
        }
    }

    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }

    /// Admit or reject a workflow payment
    pub async fn admit(&self, reference: &str) -> AdmissionDecision {
        let Some(normalized) = normalize_reference(reference) else {
            debug!(reference, "payment reference rejected before lookup");
            return AdmissionDecision::rejected(REASON_INVALID_REFERENCE);
        };

        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(&normalized)) {
            debug!(reference = %normalized, "admission served from cache");
            return AdmissionDecision::Accepted(cached);
        }

        let tx = match self.explorer.get_transaction(&normalized).await {
            Ok(Some(tx)) => tx,
            Ok(None) => {
                info!(reference = %normalized, "payment transaction not found");
                return AdmissionDecision::rejected(REASON_NOT_FOUND);
            }
            Err(e) => {
                warn!(reference = %normalized, error = %e, "explorer lookup failed");
                return AdmissionDecision::rejected(REASON_NOT_FOUND);
            }
        };

        let decision = evaluate(&normalized, &tx, &self.config);
        match &decision {
            AdmissionDecision::Accepted(payment) => {
                info!(
                    reference = %normalized,
                    payer = %payment.payer,
                    token = ?payment.token,
                    "payment admitted"
                );
                if let Some(cache) = &self.cache {
                    cache
                        .entries
                        .insert(normalized.clone(), (payment.clone(), Instant::now()));
                }
            }
            AdmissionDecision::Rejected { reason } => {
                info!(reference = %normalized, reason = %reason, "payment rejected");
            }
        }
        decision
    }
}
