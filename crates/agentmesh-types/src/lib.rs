//! AgentMesh Types - Canonical domain types for the agent coordination core
//!
//! This crate contains the foundational types shared by every AgentMesh crate
//! and has zero dependencies on other agentmesh crates. It defines:
//!
//! - Identity types (AgentId, TaskId)
//! - Payment tokens accepted by agents
//! - Agent identity records and registration requests
//! - Reputation rows and task outcomes
//! - Immutable task audit records and content digests
//! - Orchestration requests, strategies and results
//!
//! # Flow
//!
//! ```text
//! Payment → Admission → Selection → Invocation → Reputation + Audit
//! ```

pub mod identity;
pub mod token;
pub mod agent;
pub mod reputation;
pub mod task;
pub mod orchestration;
pub mod error;

pub use identity::*;
pub use token::*;
pub use agent::*;
pub use reputation::*;
pub use task::*;
pub use orchestration::*;
pub use error::*;

/// Version of the AgentMesh types schema
pub const TYPES_VERSION: &str = "0.1.0";
