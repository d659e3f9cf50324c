//! AgentMesh Server
//!
//! Agent registry, reputation-ranked discovery and paid multi-agent
//! orchestration over HTTP.
//!
//! # Usage
//!
//! ```bash
//! # In-memory store, mainnet explorer
//! agentmesh-server --payment-recipient SP3...
//!
//! # PostgreSQL store
//! agentmesh-server --store postgres --database-url postgresql://localhost/agentmesh
//!
//! # Environment overrides
//! AGENTMESH__SERVER__PORT=9000 agentmesh-server
//! ```

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use agentmesh_orchestrator::{HttpAgentInvoker, OrchestrationEngine};
use agentmesh_payment::{HttpExplorer, PaymentGate};
use agentmesh_server::config::{LoggingConfig, ServerConfig, StoreBackend};
use agentmesh_server::{create_router, AppState};
use agentmesh_store::{CapabilityStore, InMemoryStore, PgStore, StoreConfig};

// =============================================================================
// CLI Arguments
// =============================================================================

/// AgentMesh Server - paid multi-agent orchestration
#[derive(Parser, Debug)]
#[command(name = "agentmesh-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "AGENTMESH_CONFIG")]
    config: Option<String>,

    /// Host to bind to
    #[arg(long, env = "AGENTMESH_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "AGENTMESH_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "AGENTMESH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, env = "AGENTMESH_LOG_FORMAT")]
    log_format: Option<String>,

    /// Capability store backend
    #[arg(long, value_enum, env = "AGENTMESH_STORE")]
    store: Option<StoreBackend>,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Chain explorer base URL
    #[arg(long, env = "AGENTMESH_EXPLORER_URL")]
    explorer_url: Option<String>,

    /// Address that must receive direct STX payments
    #[arg(long, env = "AGENTMESH_PAYMENT_RECIPIENT")]
    payment_recipient: Option<String>,

    /// Contract whose calls count as payments
    #[arg(long, env = "AGENTMESH_PAYMENT_CONTRACT")]
    payment_contract: Option<String>,

    /// Development mode: built-in defaults with debug logging, config files ignored
    #[arg(long, env = "AGENTMESH_DEV_MODE")]
    dev: bool,
}

impl Args {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if let Some(backend) = self.store {
            config.store.backend = backend;
        }
        if let Some(url) = self.database_url {
            config.store.postgres.postgres_url = url;
        }
        if let Some(url) = self.explorer_url {
            config.payment.explorer_url = url;
        }
        if let Some(recipient) = self.payment_recipient {
            config.payment.payment_recipient = recipient;
        }
        if let Some(contract) = self.payment_contract {
            config.payment.payment_contract = contract;
        }
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut server_config = if args.dev {
        ServerConfig::development()
    } else {
        ServerConfig::load(args.config.as_deref())?
    };
    let dev_mode = args.dev;
    args.apply(&mut server_config);

    init_logging(&server_config.logging);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        dev_mode,
        "Starting AgentMesh Server"
    );

    validate_config(&server_config);

    let store = init_store(server_config.store.backend, &server_config.store.postgres).await?;

    let explorer = HttpExplorer::new(
        &server_config.payment.explorer_url,
        server_config.payment.request_timeout(),
    )
    .context("failed to build explorer client")?;
    tracing::info!(
        explorer = %explorer.base_url(),
        network = %server_config.payment.network,
        "Payment gate configured"
    );
    let gate = Arc::new(PaymentGate::new(Arc::new(explorer), server_config.payment.clone()));

    let invoker = HttpAgentInvoker::new(server_config.orchestrator.invoke_timeout())
        .context("failed to build agent client")?;

    let engine = Arc::new(OrchestrationEngine::new(
        store.clone(),
        gate,
        Arc::new(invoker),
        server_config.orchestrator.clone(),
    ));

    let state = AppState::new(store, engine).with_recent_tasks(server_config.api.recent_tasks);
    let app = create_router(state, &server_config.api);

    let addr = server_config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        host = %server_config.server.host,
        port = %server_config.server.port,
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

// =============================================================================
// Initialization Functions
// =============================================================================

/// Initialize tracing/logging
fn init_logging(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber
                .with(fmt::layer().json().with_target(true))
                .init();
        }
        _ => {
            subscriber
                .with(fmt::layer().pretty().with_target(true))
                .init();
        }
    }
}

fn validate_config(config: &ServerConfig) {
    if config.payment.payment_recipient.is_empty() {
        tracing::warn!("No payment recipient configured; direct STX transfers will be rejected");
    }
    if config.payment.payment_contract.is_empty() {
        tracing::warn!("No payment contract configured; contract-call payments will be rejected");
    }
}

async fn init_store(
    backend: StoreBackend,
    config: &StoreConfig,
) -> anyhow::Result<Arc<dyn CapabilityStore>> {
    match backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; registrations are lost on restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StoreBackend::Postgres => {
            tracing::info!(url = %config.postgres_url_masked(), "Connecting to database...");
            let store = PgStore::connect(config).await?;
            if !store.health_check().await {
                anyhow::bail!("Database health check failed");
            }
            tracing::info!("Database connected successfully");
            Ok(Arc::new(store))
        }
    }
}

// =============================================================================
// Graceful Shutdown
// =============================================================================

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
