//! Guide Chat - conversational guide for senior living options
//!
//! Serves WebSocket chat sessions backed by an LLM, with accounts and
//! stored transcripts over a small REST API.

mod api;
mod auth;
mod config;
mod conversation;
mod db;
mod llm;

use api::{create_router, AppState};
use auth::{AuthConfig, AuthService};
use axum::http::HeaderValue;
use config::{CorsOrigins, ServerConfig};
use conversation::{LlmModelClient, ModelClient};
use db::Database;
use llm::LlmConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guide_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = ServerConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;
    db.ping()?;

    // Model client
    let llm_config = LlmConfig::from_env();
    let model = llm::build_service(&llm_config)
        .map(|service| Arc::new(LlmModelClient::new(service)) as Arc<dyn ModelClient>);
    if model.is_some() {
        tracing::info!(model = %llm_config.model_name(), "LLM client initialized");
    } else {
        tracing::warn!("No LLM credentials configured. Set ANTHROPIC_API_KEY or LLM_GATEWAY.");
    }

    let auth = Arc::new(AuthService::new(db.clone(), &AuthConfig::from_env())?);
    let state = AppState::new(db, auth, model);

    let app = create_router(state)
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Guide Chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origins {
        CorsOrigins::Any => layer.allow_origin(Any),
        CorsOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            layer.allow_origin(values)
        }
    }
}
