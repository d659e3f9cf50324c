//! Remote agent invocation

use std::time::Duration;

use agentmesh_types::Agent;
use async_trait::async_trait;
use tracing::debug;

use crate::InvokeError;

/// Header carrying the workflow's verified payment reference
pub const PAYMENT_REFERENCE_HEADER: &str = "X-Payment-Reference";

/// Performs one capability call against a remote agent
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(
        &self,
        agent: &Agent,
        capability: &str,
        input: &serde_json::Value,
        payment_reference: &str,
    ) -> Result<serde_json::Value, InvokeError>;
}

/// JSON-over-HTTP invoker: `POST {endpoint}/{capability}`
pub struct HttpAgentInvoker {
    client: reqwest::Client,
}

impl HttpAgentInvoker {
    pub fn new(timeout: Duration) -> Result<Self, InvokeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AgentInvoker for HttpAgentInvoker {
    async fn invoke(
        &self,
        agent: &Agent,
        capability: &str,
        input: &serde_json::Value,
        payment_reference: &str,
    ) -> Result<serde_json::Value, InvokeError> {
        let url = agent.capability_url(capability);
        debug!(agent_id = %agent.id, url = %url, "invoking agent");

        let resp = self
            .client
            .post(&url)
            .header(PAYMENT_REFERENCE_HEADER, payment_reference)
            .json(input)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(InvokeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| InvokeError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentmesh_types::{AgentRegistration, PaymentToken};
    use axum::{
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};

    async fn serve() -> String {
        let router = Router::new()
            .route(
                "/echo",
                post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                    let reference = headers
                        .get(PAYMENT_REFERENCE_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    Json(json!({"echo": body, "reference": reference}))
                }),
            )
            .route(
                "/broken",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model overloaded") }),
            )
            .route("/garbled", post(|| async { "not json" }))
            .route(
                "/slow",
                post(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Json(json!({}))
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    fn agent(endpoint: &str) -> Agent {
        AgentRegistration {
            owner_address: "SP2OWNER".to_string(),
            name: "echo".to_string(),
            description: None,
            capabilities: vec!["echo".to_string()],
            endpoint: endpoint.to_string(),
            accepted_tokens: vec![PaymentToken::Stx],
            metadata: Default::default(),
        }
        .into_agent()
        .unwrap()
    }

    #[tokio::test]
    async fn test_posts_input_with_payment_header() {
        let agent = agent(&serve().await);
        let invoker = HttpAgentInvoker::new(Duration::from_secs(5)).unwrap();
        let out = invoker
            .invoke(&agent, "echo", &json!({"q": 1}), "0xabc")
            .await
            .unwrap();
        assert_eq!(out, json!({"echo": {"q": 1}, "reference": "0xabc"}));
    }

    #[tokio::test]
    async fn test_error_status_and_bad_body() {
        let agent = agent(&serve().await);
        let invoker = HttpAgentInvoker::new(Duration::from_secs(5)).unwrap();

        let err = invoker.invoke(&agent, "broken", &json!({}), "0xabc").await.unwrap_err();
        assert!(matches!(err, InvokeError::Status { status: 500, .. }));
        assert_eq!(err.to_string(), "model overloaded");

        let err = invoker.invoke(&agent, "garbled", &json!({}), "0xabc").await.unwrap_err();
        assert!(matches!(err, InvokeError::Deserialization(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let agent = agent(&serve().await);
        let invoker = HttpAgentInvoker::new(Duration::from_millis(100)).unwrap();
        let err = invoker.invoke(&agent, "slow", &json!({}), "0xabc").await.unwrap_err();
        assert!(matches!(err, InvokeError::Transport(_)));
    }
}
