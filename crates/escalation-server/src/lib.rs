//! Escalation Server
//!
//! HTTP runtime for the `escalation` core: receives run requests, places
//! calls through the voice provider, follows them via status webhooks and
//! reports the outcome to the requester.

pub mod config;
pub mod dispatch;
pub mod http;
pub mod ledger;
pub mod provider;
pub mod reporter;
pub mod service;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use escalation::ScriptBuilder;
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use service::EscalationService;

use dispatch::HttpDispatcher;
use provider::TwilioProvider;
use reporter::{HttpStatusSink, StatusReporter};

/// Shared server state
pub struct AppState {
    pub service: Arc<EscalationService>,
}

impl AppState {
    pub fn new(service: EscalationService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    /// Wire the production provider, dispatcher and reporter from config.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let timeout = config.http_timeout();
        let provider = TwilioProvider::new(&config.twilio, timeout)
            .context("Failed to build Twilio client")?;
        let dispatcher = HttpDispatcher::new(config.launch_url(), timeout)
            .context("Failed to build launch client")?;
        let sink = HttpStatusSink::new(timeout).context("Failed to build callback client")?;

        let service = EscalationService::new(
            config.api_key.clone(),
            config.webhook_url(),
            ScriptBuilder::new(config.prompts.clone()),
            Arc::new(provider),
            Arc::new(dispatcher),
            StatusReporter::new(Arc::new(sink)),
        );
        Ok(Self::new(service))
    }
}

/// Create the router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/start", post(http::start))
        .route("/call/start", post(http::launch))
        .route("/call/webhook", post(http::webhook))
        .route("/health", get(http::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the server. On Ctrl-C, stops accepting requests and waits for
/// calls still being placed or fed back into the loop.
pub async fn serve(addr: &str, state: Arc<AppState>) -> Result<()> {
    let app = create_router(state.clone());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, "Escalation server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Server error")?;

    tracing::info!("Waiting for background calls to settle");
    state.service.settle().await;
    Ok(())
}
