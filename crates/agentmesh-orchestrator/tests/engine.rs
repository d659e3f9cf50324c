use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use agentmesh_orchestrator::{
    AgentInvoker, InvokeError, OrchestrationEngine, OrchestrationError, OrchestratorConfig,
};
use agentmesh_payment::{
    ContractCallPayload, ExplorerClient, ExplorerResult, ExplorerTransaction, FunctionArg,
    PaymentConfig, PaymentGate, TokenTransferPayload,
};
use agentmesh_store::{
    AgentFilter, CapabilityStore, InMemoryStore, RankedAgent, StoreError, StoreResult,
};
use agentmesh_types::{
    Agent, AgentId, AgentRegistration, OrchestrationRequest, PaymentToken, Reputation, Strategy,
    TaskRecord, TaskRequest, TaskStatus, NO_AGENT, PAYMENT_CAPABILITY,
};

const RECIPIENT: &str = "SP3RECIPIENT";
const WRAPPED: &str = "SM3VDXK3WZZSA84XXFKAFAF15NNZX32CTSG82JFQ4.sbtc-token";

fn stx_reference() -> String {
    format!("0x{}", "ab".repeat(32))
}

fn sbtc_reference() -> String {
    format!("0x{}", "cd".repeat(32))
}

struct FixtureExplorer {
    txs: HashMap<String, ExplorerTransaction>,
}

impl FixtureExplorer {
    fn new() -> Self {
        let mut txs = HashMap::new();
        txs.insert(
            stx_reference(),
            ExplorerTransaction {
                tx_id: Some(stx_reference()),
                tx_status: "success".to_string(),
                tx_type: "token_transfer".to_string(),
                sender_address: "SP2PAYER".to_string(),
                token_transfer: Some(TokenTransferPayload {
                    recipient_address: RECIPIENT.to_string(),
                    amount: "1000000".to_string(),
                }),
                contract_call: None,
            },
        );
        txs.insert(
            sbtc_reference(),
            ExplorerTransaction {
                tx_id: Some(sbtc_reference()),
                tx_status: "success".to_string(),
                tx_type: "contract_call".to_string(),
                sender_address: "SP2BTCPAYER".to_string(),
                token_transfer: None,
                contract_call: Some(ContractCallPayload {
                    contract_id: WRAPPED.to_string(),
                    function_name: "transfer".to_string(),
                    function_args: vec![
                        FunctionArg {
                            name: "amount".to_string(),
                            arg_type: "uint".to_string(),
                            repr: "u1000".to_string(),
                        },
                        FunctionArg {
                            name: "recipient".to_string(),
                            arg_type: "principal".to_string(),
                            repr: format!("'{}", RECIPIENT),
                        },
                    ],
                }),
            },
        );
        Self { txs }
    }
}

#[async_trait]
impl ExplorerClient for FixtureExplorer {
    async fn get_transaction(&self, tx_id: &str) -> ExplorerResult<Option<ExplorerTransaction>> {
        Ok(self.txs.get(tx_id).cloned())
    }
}

enum Behavior {
    Reply(Value),
    Delayed(Duration, Value),
    Fail(u16, &'static str),
}

#[derive(Default)]
struct ScriptedInvoker {
    behaviors: HashMap<String, Behavior>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedInvoker {
    fn on(mut self, capability: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(capability.to_string(), behavior);
        self
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        _agent: &Agent,
        capability: &str,
        input: &Value,
        _payment_reference: &str,
    ) -> Result<Value, InvokeError> {
        self.calls
            .lock()
            .unwrap()
            .push((capability.to_string(), input.clone()));
        match self.behaviors.get(capability) {
            Some(Behavior::Reply(v)) => Ok(v.clone()),
            Some(Behavior::Delayed(d, v)) => {
                tokio::time::sleep(*d).await;
                Ok(v.clone())
            }
            Some(Behavior::Fail(status, body)) => Err(InvokeError::Status {
                status: *status,
                body: body.to_string(),
            }),
            None => Err(InvokeError::Transport("connection refused".to_string())),
        }
    }
}

struct Harness {
    store: Arc<InMemoryStore>,
    invoker: Arc<ScriptedInvoker>,
    engine: OrchestrationEngine,
}

fn payment_gate() -> Arc<PaymentGate> {
    Arc::new(PaymentGate::new(
        Arc::new(FixtureExplorer::new()),
        PaymentConfig {
            payment_recipient: RECIPIENT.to_string(),
            payment_contract: format!("{}.agentmesh-payments", RECIPIENT),
            wrapped_asset_contract: WRAPPED.to_string(),
            ..PaymentConfig::default()
        },
    ))
}

fn harness(invoker: ScriptedInvoker) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let invoker = Arc::new(invoker);
    let engine = OrchestrationEngine::new(
        store.clone(),
        payment_gate(),
        invoker.clone(),
        OrchestratorConfig::default(),
    );
    Harness {
        store,
        invoker,
        engine,
    }
}

/// Serves reads from memory but cannot commit outcomes
struct ReadOnlyStore {
    inner: InMemoryStore,
}

#[async_trait]
impl CapabilityStore for ReadOnlyStore {
    async fn insert_agent(&self, agent: &Agent) -> StoreResult<()> {
        self.inner.insert_agent(agent).await
    }
    async fn get_agent(&self, id: &AgentId) -> StoreResult<Option<Agent>> {
        self.inner.get_agent(id).await
    }
    async fn insert_reputation(&self, reputation: &Reputation) -> StoreResult<()> {
        self.inner.insert_reputation(reputation).await
    }
    async fn get_reputation(&self, agent_id: &AgentId) -> StoreResult<Option<Reputation>> {
        self.inner.get_reputation(agent_id).await
    }
    async fn update_reputation(&self, _expected: u64, _reputation: &Reputation) -> StoreResult<()> {
        Err(StoreError::Connection("database is read-only".to_string()))
    }
    async fn query_agents(&self, filter: &AgentFilter) -> StoreResult<Vec<RankedAgent>> {
        self.inner.query_agents(filter).await
    }
    async fn insert_task_record(&self, _record: &TaskRecord) -> StoreResult<()> {
        Err(StoreError::Connection("database is read-only".to_string()))
    }
    async fn commit_outcome(
        &self,
        _expected: u64,
        _reputation: &Reputation,
        _record: &TaskRecord,
    ) -> StoreResult<()> {
        Err(StoreError::Connection("database is read-only".to_string()))
    }
    async fn query_tasks(&self, agent_id: &AgentId, limit: usize) -> StoreResult<Vec<TaskRecord>> {
        self.inner.query_tasks(agent_id, limit).await
    }
    async fn register_agent(&self, agent: &Agent) -> StoreResult<Reputation> {
        self.inner.register_agent(agent).await
    }
}

async fn register(store: &InMemoryStore, capabilities: &[&str], tokens: &[PaymentToken]) -> Agent {
    let agent = AgentRegistration {
        owner_address: "SP2OWNER".to_string(),
        name: capabilities.join("+"),
        description: None,
        capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        endpoint: "http://127.0.0.1:9".to_string(),
        accepted_tokens: tokens.to_vec(),
        metadata: Default::default(),
    }
    .into_agent()
    .unwrap();
    store.register_agent(&agent).await.unwrap();
    agent
}

#[tokio::test]
async fn test_best_agent_workflow_records_one_completed_task() {
    let h = harness(ScriptedInvoker::default().on("price_feed", Behavior::Reply(json!({"btc": 97000}))));
    let agent = register(&h.store, &["price_feed"], &[PaymentToken::Stx]).await;

    let request = OrchestrationRequest::new(
        Strategy::BestAgent,
        vec![
            TaskRequest::new("price_feed", json!({"pair": "BTC-USD"})).with_max_payment(2_000),
            TaskRequest::new("ignored", json!({})),
        ],
    );
    let result = h.engine.run(&request, &stx_reference(), None).await.unwrap();

    assert!(result.success);
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].agent_id, agent.id.to_string());
    assert_eq!(result.results[0].output, Some(json!({"btc": 97000})));
    assert_eq!(result.payer.as_deref(), Some("SP2PAYER"));
    assert_eq!(result.payment_token, Some(PaymentToken::Stx));

    let rep = h.store.get_reputation(&agent.id).await.unwrap().unwrap();
    assert_eq!(rep.total_tasks, 1);
    assert_eq!(rep.successful_tasks, 1);
    assert_eq!(rep.rating, 51);
    assert_eq!(rep.earned_stx, 2_000);

    let tasks = h.store.query_tasks(&agent.id, 10).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Completed);
    assert_eq!(tasks[0].payment_reference, stx_reference());
    assert_eq!(tasks[0].payer.as_deref(), Some("SP2PAYER"));
    assert_eq!(Some(tasks[0].id), result.results[0].task_id);
}

#[tokio::test]
async fn test_sequential_merges_previous_output() {
    let h = harness(
        ScriptedInvoker::default()
            .on("fetch", Behavior::Reply(json!({"text": "hello"})))
            .on("summarize", Behavior::Reply(json!({"summary": "hi"}))),
    );
    register(&h.store, &["fetch"], &[PaymentToken::Stx]).await;
    register(&h.store, &["summarize"], &[PaymentToken::Stx]).await;

    let request = OrchestrationRequest::new(
        Strategy::Sequential,
        vec![
            TaskRequest::new("fetch", json!({"url": "https://example.org"})),
            TaskRequest::new("summarize", json!({"max_words": 5})),
        ],
    );
    let result = h.engine.run(&request, &stx_reference(), None).await.unwrap();
    assert!(result.success);

    let calls = h.invoker.calls();
    assert_eq!(calls[0].1, json!({"url": "https://example.org"}));
    assert_eq!(
        calls[1].1,
        json!({"max_words": 5, "previous_result": {"text": "hello"}})
    );
}

#[tokio::test]
async fn test_sequential_continues_past_missing_agent() {
    let h = harness(ScriptedInvoker::default().on("summarize", Behavior::Reply(json!("ok"))));
    let agent = register(&h.store, &["summarize"], &[PaymentToken::Stx]).await;

    let request = OrchestrationRequest::new(
        Strategy::Sequential,
        vec![
            TaskRequest::new("translate", json!({"to": "fr"})),
            TaskRequest::new("summarize", json!({"doc": 1})),
        ],
    );
    let result = h.engine.run(&request, &stx_reference(), None).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.results[0].agent_id, NO_AGENT);
    assert_eq!(
        result.results[0].error.as_deref(),
        Some("no agent found for capability 'translate'")
    );
    assert!(result.results[1].success);
    assert_eq!(h.invoker.calls()[0].1, json!({"doc": 1}));
    // Unmatched tasks are never attempted and leave no record
    assert_eq!(h.store.task_count().await, 1);
    assert_eq!(h.store.query_tasks(&agent.id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_parallel_results_follow_request_order() {
    let h = harness(
        ScriptedInvoker::default()
            .on("slow", Behavior::Delayed(Duration::from_millis(80), json!("slow")))
            .on("fast", Behavior::Reply(json!("fast"))),
    );
    register(&h.store, &["slow"], &[PaymentToken::Stx]).await;
    register(&h.store, &["fast"], &[PaymentToken::Stx]).await;

    let request = OrchestrationRequest::new(
        Strategy::Parallel,
        vec![
            TaskRequest::new("slow", json!({})),
            TaskRequest::new("fast", json!({})),
            TaskRequest::new("missing", json!({})),
        ],
    );
    let result = h.engine.run(&request, &stx_reference(), None).await.unwrap();

    let capabilities: Vec<&str> = result.results.iter().map(|r| r.capability.as_str()).collect();
    assert_eq!(capabilities, vec!["slow", "fast", "missing"]);
    assert_eq!(result.results[0].output, Some(json!("slow")));
    assert!(result.results[1].success);
    assert!(!result.results[2].success);
    assert!(!result.success);
    assert_eq!(h.invoker.calls().len(), 2);
}

#[tokio::test]
async fn test_failing_agent_is_penalized_and_audited() {
    let h = harness(ScriptedInvoker::default().on("price_feed", Behavior::Fail(500, "model overloaded")));
    let agent = register(&h.store, &["price_feed"], &[PaymentToken::Stx]).await;

    let request = OrchestrationRequest::new(
        Strategy::BestAgent,
        vec![TaskRequest::new("price_feed", json!({}))],
    );
    let result = h.engine.run(&request, &stx_reference(), None).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.results[0].error.as_deref(), Some("model overloaded"));

    let rep = h.store.get_reputation(&agent.id).await.unwrap().unwrap();
    assert_eq!(rep.failed_tasks, 1);
    assert_eq!(rep.rating, 0);

    let tasks = h.store.query_tasks(&agent.id, 10).await.unwrap();
    assert_eq!(tasks[0].status, TaskStatus::Failed);
    assert_eq!(tasks[0].error.as_deref(), Some("model overloaded"));
    assert!(tasks[0].response_digest.is_none());
}

#[tokio::test]
async fn test_rejected_payment_short_circuits() {
    let h = harness(ScriptedInvoker::default().on("price_feed", Behavior::Reply(json!({}))));
    register(&h.store, &["price_feed"], &[PaymentToken::Stx]).await;

    let request = OrchestrationRequest::new(
        Strategy::Parallel,
        vec![TaskRequest::new("price_feed", json!({}))],
    );
    let result = h
        .engine
        .run(&request, &format!("0x{}", "ef".repeat(32)), None)
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].capability, PAYMENT_CAPABILITY);
    assert_eq!(result.results[0].agent_id, NO_AGENT);
    assert_eq!(result.results[0].error.as_deref(), Some("payment rejected: not found"));
    assert!(h.invoker.calls().is_empty());
    assert_eq!(h.store.task_count().await, 0);
}

#[tokio::test]
async fn test_wrapped_asset_payment_selects_and_credits_sbtc() {
    let h = harness(ScriptedInvoker::default().on("swap", Behavior::Reply(json!({"filled": true}))));
    let stx_agent = register(&h.store, &["swap"], &[PaymentToken::Stx]).await;
    let btc_agent = register(&h.store, &["swap"], &[PaymentToken::Sbtc]).await;

    let request = OrchestrationRequest::new(
        Strategy::BestAgent,
        vec![TaskRequest::new("swap", json!({})).with_max_payment(700)],
    );
    let result = h.engine.run(&request, &sbtc_reference(), None).await.unwrap();

    assert!(result.success);
    assert_eq!(result.results[0].agent_id, btc_agent.id.to_string());
    assert_eq!(result.payment_token, Some(PaymentToken::Sbtc));

    let rep = h.store.get_reputation(&btc_agent.id).await.unwrap().unwrap();
    assert_eq!(rep.earned_sbtc, 700);
    assert_eq!(rep.earned_stx, 0);
    let idle = h.store.get_reputation(&stx_agent.id).await.unwrap().unwrap();
    assert_eq!(idle.total_tasks, 0);
}

#[tokio::test]
async fn test_empty_workflow_is_invalid() {
    let h = harness(ScriptedInvoker::default());
    let request = OrchestrationRequest::new(Strategy::Sequential, Vec::new());
    let err = h.engine.run(&request, &stx_reference(), None).await.unwrap_err();
    assert!(matches!(err, OrchestrationError::Invalid(_)));
}

#[tokio::test]
async fn test_requester_is_recorded_on_task() {
    let h = harness(ScriptedInvoker::default().on("price_feed", Behavior::Reply(json!(1))));
    let provider = register(&h.store, &["price_feed"], &[PaymentToken::Stx]).await;
    let requester = register(&h.store, &["planner"], &[PaymentToken::Stx]).await;

    let request = OrchestrationRequest::new(
        Strategy::BestAgent,
        vec![TaskRequest::new("price_feed", json!({}))],
    );
    h.engine
        .run(&request, &stx_reference(), Some(requester.id))
        .await
        .unwrap();

    let as_requester = h.store.query_tasks(&requester.id, 10).await.unwrap();
    assert_eq!(as_requester.len(), 1);
    assert_eq!(as_requester[0].provider, provider.id);
}

#[tokio::test]
async fn test_store_failure_aborts_the_workflow() {
    let inner = InMemoryStore::new();
    let agent = register(&inner, &["price_feed"], &[PaymentToken::Stx]).await;
    let store = Arc::new(ReadOnlyStore {
        inner: inner.clone(),
    });
    let invoker = Arc::new(ScriptedInvoker::default().on("price_feed", Behavior::Reply(json!(1))));
    let engine = OrchestrationEngine::new(
        store,
        payment_gate(),
        invoker.clone(),
        OrchestratorConfig::default(),
    );

    let request = OrchestrationRequest::new(
        Strategy::Parallel,
        vec![
            TaskRequest::new("price_feed", json!({})),
            TaskRequest::new("price_feed", json!({})),
        ],
    );
    let err = engine.run(&request, &stx_reference(), None).await.unwrap_err();

    assert!(matches!(err, OrchestrationError::Store(StoreError::Connection(_))));
    let rep = inner.get_reputation(&agent.id).await.unwrap().unwrap();
    assert_eq!(rep.total_tasks, 0);
    assert_eq!(inner.task_count().await, 0);
}

#[tokio::test]
async fn test_parallel_tasks_on_one_agent_keep_every_update() {
    let h = harness(
        ScriptedInvoker::default()
            .on("price_feed", Behavior::Delayed(Duration::from_millis(20), json!({"btc": 1}))),
    );
    let agent = register(&h.store, &["price_feed"], &[PaymentToken::Stx]).await;

    let request = OrchestrationRequest::new(
        Strategy::Parallel,
        vec![
            TaskRequest::new("price_feed", json!({"n": 1})).with_max_payment(300),
            TaskRequest::new("price_feed", json!({"n": 2})).with_max_payment(400),
            TaskRequest::new("price_feed", json!({"n": 3})).with_max_payment(500),
        ],
    );
    let result = h.engine.run(&request, &stx_reference(), None).await.unwrap();
    assert!(result.success);
    assert!(result
        .results
        .iter()
        .all(|r| r.agent_id == agent.id.to_string()));

    let rep = h.store.get_reputation(&agent.id).await.unwrap().unwrap();
    assert_eq!(rep.total_tasks, 3);
    assert_eq!(rep.successful_tasks, 3);
    assert_eq!(rep.earned_stx, 1_200);
    assert!(agentmesh_reputation::is_consistent(&rep));
    assert_eq!(h.store.query_tasks(&agent.id, 10).await.unwrap().len(), 3);
}
