//! Compliance Server - HTTP API for the content review pipeline
//!
//! Provides REST endpoints for:
//! - Compliant content generation from prompts
//! - Document upload and compliance review
//! - Rule administration (versioning, duplicate checks, PDF extraction)
//! - Submission approval workflow and audit trail

use anyhow::Result;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

mod handlers;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("compliance_api=info".parse()?)
                .add_directive("compliance_core=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    // Initialize application state
    info!("Initializing application state...");
    let state = AppState::new()?;
    let state = Arc::new(state);

    // Build router
    let app = Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Agent endpoints
        .route("/agent/generate", post(handlers::generate))
        .route("/agent/check-document", post(handlers::check_document))
        .route("/agent/rewrite", post(handlers::rewrite))
        // Content administration
        .route("/admin/content", get(handlers::list_content))
        .route("/admin/content/:id", get(handlers::get_content))
        .route("/admin/content/:id/approve", post(handlers::approve_content))
        .route("/admin/content/:id/reject", post(handlers::reject_content))
        // Rule administration
        .route("/admin/rules", get(handlers::list_rules).post(handlers::create_rule))
        .route("/admin/rules/:id", put(handlers::update_rule))
        .route("/admin/rules/:id/activate", post(handlers::activate_rule))
        .route("/admin/rules/:id/deactivate", post(handlers::deactivate_rule))
        .route("/admin/rules/check-duplicate", post(handlers::check_duplicate))
        .route("/admin/rules/extract", post(handlers::extract_rules))
        .route("/admin/rules/sync-embeddings", post(handlers::sync_embeddings))
        // Audit trail
        .route("/admin/audit", get(handlers::list_audit))
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Parse bind address
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting server on http://{}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
