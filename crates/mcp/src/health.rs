// Optional HTTP health endpoint, served next to the stdio transport

use anyhow::{Context, Result};
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use nefino_sdk::NefinoClient;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};

/// State shared by the health handlers
#[derive(Clone)]
pub struct HealthState {
    pub client: NefinoClient,
    pub tools: Vec<String>,
}

/// Bind the health listener
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind health endpoint on {}", addr))?;
    tracing::info!("Health endpoint listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Serve health checks until the task is dropped
pub async fn serve(listener: TcpListener, state: HealthState) -> Result<()> {
    axum::serve(listener, create_router(state)).await?;

    Ok(())
}

/// Create the health router
pub fn create_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/credential", get(credential_status))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new())
                .on_response(DefaultOnResponse::new()),
        )
        .with_state(Arc::new(state))
}

async fn health_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": crate::server::SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "tools": state.tools,
    }))
}

/// Credential cache snapshot; never includes the token
async fn credential_status(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    Json(state.client.credential_status().await)
}
