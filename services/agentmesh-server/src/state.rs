//! Application state shared across handlers

use std::sync::Arc;

use agentmesh_orchestrator::OrchestrationEngine;
use agentmesh_store::CapabilityStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CapabilityStore>,
    pub engine: Arc<OrchestrationEngine>,
    /// Number of recent task records returned with an agent
    pub recent_tasks: usize,
}

impl AppState {
    pub fn new(store: Arc<dyn CapabilityStore>, engine: Arc<OrchestrationEngine>) -> Self {
        Self {
            store,
            engine,
            recent_tasks: 20,
        }
    }

    pub fn with_recent_tasks(mut self, recent_tasks: usize) -> Self {
        self.recent_tasks = recent_tasks;
        self
    }
}
