//! HTTP surface of the SDK test-harness proxy.

mod bootstrap_helpers;
mod cli_args;
mod client_lifecycle;
mod command_routes;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use harness_dispatch::Dispatcher;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub use bootstrap_helpers::init_tracing;
pub use cli_args::HarnessServerCli;

const CLIENT_ENDPOINT: &str = "/client";
const CLIENT_ID_ENDPOINT: &str = "/client/{client_id}";
const COMMAND_ENDPOINT: &str = "/command/{location}/{id}";
const SPEC_ENDPOINT: &str = "/spec";
const HEALTH_ENDPOINT: &str = "/healthz";

const SDK_CAPABILITIES: &[&str] = &[
    "LocalBucketing",
    "CloudBucketing",
    "EdgeDB",
    "ClientCustomData",
    "Multithreading",
    "VariableValue",
    "Events",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessServerConfig {
    pub bind: String,
    pub sdk_request_timeout_ms: u64,
    pub spec_name: String,
}

impl Default for HarnessServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            sdk_request_timeout_ms: 5_000,
            spec_name: "Rust".to_string(),
        }
    }
}

/// State shared by every request handler.
#[derive(Debug)]
pub struct HarnessServerState {
    dispatcher: Dispatcher,
    config: HarnessServerConfig,
}

impl HarnessServerState {
    pub fn new(config: HarnessServerConfig) -> Self {
        Self {
            dispatcher: Dispatcher::with_sdk_bindings(),
            config,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &HarnessServerConfig {
        &self.config
    }

    fn sdk_request_timeout(&self) -> Duration {
        Duration::from_millis(self.config.sdk_request_timeout_ms.max(1))
    }
}

/// Run the harness proxy until ctrl-c.
pub async fn run_harness_proxy(config: HarnessServerConfig) -> Result<()> {
    let bind_addr: SocketAddr = config
        .bind
        .parse()
        .with_context(|| format!("invalid --bind '{}': expected host:port", config.bind))?;
    let state = Arc::new(HarnessServerState::new(config));

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind harness proxy on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve harness proxy listen address")?;
    tracing::info!(addr = %local_addr, spec = %state.config.spec_name, "harness proxy listening");

    let app = build_harness_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .context("harness proxy server exited unexpectedly")?;
    Ok(())
}

pub fn build_harness_router(state: Arc<HarnessServerState>) -> Router {
    Router::new()
        .route(SPEC_ENDPOINT, get(handle_spec))
        .route(HEALTH_ENDPOINT, get(handle_health))
        .route(CLIENT_ENDPOINT, post(client_lifecycle::handle_create_client))
        .route(
            CLIENT_ID_ENDPOINT,
            post(command_routes::handle_client_command)
                .delete(client_lifecycle::handle_delete_client),
        )
        .route(COMMAND_ENDPOINT, post(command_routes::handle_location_command))
        .with_state(state)
}

async fn handle_spec(State(state): State<Arc<HarnessServerState>>) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "name": state.config.spec_name,
            "version": env!("CARGO_PKG_VERSION"),
            "capabilities": SDK_CAPABILITIES,
        })),
    )
        .into_response()
}

async fn handle_health() -> Response {
    (StatusCode::OK, "healthy").into_response()
}
