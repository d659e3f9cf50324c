//! AgentMesh Payment Gate
//!
//! Admits a workflow only after its payment reference has been verified
//! against a chain explorer. Verification reads a settled transaction; it
//! never moves funds.

pub mod challenge;
pub mod config;
pub mod error;
pub mod explorer;
pub mod gate;

pub use challenge::PaymentChallenge;
pub use config::PaymentConfig;
pub use error::{ExplorerError, ExplorerResult};
pub use explorer::{
    ContractCallPayload, ExplorerClient, ExplorerTransaction, FunctionArg, HttpExplorer,
    TokenTransferPayload,
};
pub use gate::{evaluate, normalize_reference, AdmissionDecision, AdmittedPayment, PaymentGate};
