//! AgentMesh Orchestrator
//!
//! Runs paid multi-agent workflows: admits the payment, selects the best
//! agent per capability, calls it, and feeds the outcome back into the
//! agent's reputation.
//!
//! # Strategies
//!
//! - `sequential`: request order, each successful output merged into the
//!   next input under `previous_result`
//! - `parallel`: all tasks concurrently, results in request order
//! - `best_agent`: only the first task

pub mod config;
pub mod engine;
pub mod error;
pub mod invoker;
pub mod recorder;
pub mod selector;

pub use config::OrchestratorConfig;
pub use engine::{merge_previous, OrchestrationEngine};
pub use error::{EngineResult, InvokeError, OrchestrationError};
pub use invoker::{AgentInvoker, HttpAgentInvoker, PAYMENT_REFERENCE_HEADER};
pub use recorder::OutcomeRecorder;
pub use selector::AgentSelector;
