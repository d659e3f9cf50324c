//! Workflow execution
//!
//! A workflow moves through three phases:
//!
//! 1. **Admitting** - the payment reference is checked by the gate. A
//!    rejection ends the workflow with one synthetic failed result.
//! 2. **Executing** - tasks run under the requested strategy. Each attempted
//!    task updates the provider's reputation and writes an audit record.
//! 3. **Aggregated** - per-task results are combined; the workflow succeeds
//!    only if every result succeeded.
//!
//! Per-task failures (no agent, transport, bad status, bad body) never abort
//! the workflow. Store failures do.

use std::sync::Arc;
use std::time::Instant;

use agentmesh_payment::{AdmissionDecision, AdmittedPayment, PaymentGate};
use agentmesh_store::CapabilityStore;
use agentmesh_types::{
    AgentId, OrchestrationRequest, OrchestrationResult, PaymentContext, Strategy, TaskOutcome,
    TaskRecord, TaskRequest, TaskResult, PREVIOUS_RESULT_KEY,
};
use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    AgentInvoker, AgentSelector, EngineResult, OrchestratorConfig, OutcomeRecorder,
};

pub struct OrchestrationEngine {
    gate: Arc<PaymentGate>,
    selector: AgentSelector,
    invoker: Arc<dyn AgentInvoker>,
    recorder: OutcomeRecorder,
    config: OrchestratorConfig,
}

impl OrchestrationEngine {
    pub fn new(
        store: Arc<dyn CapabilityStore>,
        gate: Arc<PaymentGate>,
        invoker: Arc<dyn AgentInvoker>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            gate,
            selector: AgentSelector::new(store.clone()),
            invoker,
            recorder: OutcomeRecorder::new(store, config.max_commit_retries),
            config,
        }
    }

    pub fn gate(&self) -> &PaymentGate {
        &self.gate
    }

    pub fn selector(&self) -> &AgentSelector {
        &self.selector
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Admit the payment, then execute the workflow
    pub async fn run(
        &self,
        request: &OrchestrationRequest,
        payment_reference: &str,
        requester: Option<AgentId>,
    ) -> EngineResult<OrchestrationResult> {
        request.validate()?;
        let started = Instant::now();

        debug!(strategy = %request.strategy, tasks = request.tasks.len(), "admitting workflow");
        match self.gate.admit(payment_reference).await {
            AdmissionDecision::Accepted(payment) => {
                self.execute(request, &payment, requester, started).await
            }
            AdmissionDecision::Rejected { reason } => {
                info!(reason = %reason, "workflow rejected at admission");
                Ok(OrchestrationResult::aggregate(
                    request.strategy,
                    vec![TaskResult::admission_rejected(reason)],
                    elapsed_ms(started),
                    None,
                    None,
                ))
            }
        }
    }

    /// Execute a workflow whose payment was already admitted.
    ///
    /// `admission_started` is when the caller began admitting the payment;
    /// the reported elapsed time counts from there.
    pub async fn run_admitted(
        &self,
        request: &OrchestrationRequest,
        payment: &AdmittedPayment,
        requester: Option<AgentId>,
        admission_started: Instant,
    ) -> EngineResult<OrchestrationResult> {
        request.validate()?;
        self.execute(request, payment, requester, admission_started).await
    }

    async fn execute(
        &self,
        request: &OrchestrationRequest,
        payment: &AdmittedPayment,
        requester: Option<AgentId>,
        started: Instant,
    ) -> EngineResult<OrchestrationResult> {
        let token = payment.token.unwrap_or(self.config.default_token);
        let ctx = PaymentContext {
            reference: payment.reference.clone(),
            payer: Some(payment.payer.clone()),
            token,
        };

        info!(
            strategy = %request.strategy,
            tasks = request.tasks.len(),
            payer = %payment.payer,
            token = %token,
            "executing workflow"
        );

        let results = match request.strategy {
            Strategy::Sequential => self.run_sequential(&request.tasks, &ctx, requester).await?,
            Strategy::Parallel => self.run_parallel(&request.tasks, &ctx, requester).await?,
            Strategy::BestAgent => match request.tasks.first() {
                Some(task) => vec![self.run_task(task, task.input.clone(), &ctx, requester).await?],
                None => Vec::new(),
            },
        };

        let result = OrchestrationResult::aggregate(
            request.strategy,
            results,
            elapsed_ms(started),
            ctx.payer.clone(),
            Some(token),
        );
        info!(
            success = result.success,
            failed = result.failed_tasks(),
            elapsed_ms = result.total_elapsed_ms,
            "workflow aggregated"
        );
        Ok(result)
    }

    async fn run_sequential(
        &self,
        tasks: &[TaskRequest],
        ctx: &PaymentContext,
        requester: Option<AgentId>,
    ) -> EngineResult<Vec<TaskResult>> {
        let mut results = Vec::with_capacity(tasks.len());
        let mut previous: Option<Value> = None;

        for task in tasks {
            let input = merge_previous(task.input.clone(), previous.take());
            let result = self.run_task(task, input, ctx, requester).await?;
            if result.success {
                previous = result.output.clone();
            }
            results.push(result);
        }
        Ok(results)
    }

    async fn run_parallel(
        &self,
        tasks: &[TaskRequest],
        ctx: &PaymentContext,
        requester: Option<AgentId>,
    ) -> EngineResult<Vec<TaskResult>> {
        join_all(
            tasks
                .iter()
                .map(|task| self.run_task(task, task.input.clone(), ctx, requester)),
        )
        .await
        .into_iter()
        .collect()
    }

    /// Select, invoke and record one task
    async fn run_task(
        &self,
        task: &TaskRequest,
        input: Value,
        ctx: &PaymentContext,
        requester: Option<AgentId>,
    ) -> EngineResult<TaskResult> {
        let Some(agent) = self.selector.find_best(&task.capability, ctx.token).await? else {
            warn!(capability = %task.capability, token = %ctx.token, "no agent for capability");
            return Ok(TaskResult::unmatched(&task.capability));
        };

        let amount = task.max_payment.unwrap_or(self.config.default_task_reward);
        let mut record = TaskRecord::pending(
            requester,
            agent.id,
            &task.capability,
            ctx,
            amount,
            &input,
            Utc::now(),
        );

        let call_started = Instant::now();
        let response = self
            .invoker
            .invoke(&agent, &task.capability, &input, &ctx.reference)
            .await;
        let latency_ms = elapsed_ms(call_started);
        let completed_at = Utc::now();

        let outcome = match &response {
            Ok(output) => record.complete(output, completed_at).map(|_| true),
            Err(e) => {
                warn!(agent_id = %agent.id, capability = %task.capability, error = %e, "agent call failed");
                record.fail(e.to_string(), completed_at).map(|_| false)
            }
        }?;

        self.recorder
            .record(
                &agent.id,
                &TaskOutcome {
                    success: outcome,
                    paid_amount: amount,
                    token: ctx.token,
                    response_time_ms: latency_ms,
                    completed_at,
                },
                &record,
            )
            .await?;

        Ok(match response {
            Ok(output) => TaskResult::succeeded(
                &task.capability,
                agent.id.to_string(),
                output,
                latency_ms,
                record.id,
            ),
            Err(e) => TaskResult::failed(
                &task.capability,
                agent.id.to_string(),
                e.to_string(),
                latency_ms,
                Some(record.id),
            ),
        })
    }
}

/// Carry a prior task's output into the next task's input
pub fn merge_previous(input: Value, previous: Option<Value>) -> Value {
    let Some(previous) = previous else {
        return input;
    };
    match input {
        Value::Object(mut map) => {
            map.insert(PREVIOUS_RESULT_KEY.to_string(), previous);
            Value::Object(map)
        }
        other => {
            let mut map = serde_json::Map::new();
            map.insert("input".to_string(), other);
            map.insert(PREVIOUS_RESULT_KEY.to_string(), previous);
            Value::Object(map)
        }
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
