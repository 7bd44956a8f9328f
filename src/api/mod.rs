//! API module
//!
//! HTTP API endpoints and middleware.

pub mod middleware;
pub mod routes;

use axum::{http::Uri, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::db::Database;
use crate::error::AppError;

pub use routes::create_router;

/// Build the full application router
pub fn build_router(db: Database) -> Router {
    // Layers run bottom-up: the request id must exist before logging sees it
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", create_router())
        .fallback(not_found)
        .layer(axum::middleware::from_fn(middleware::logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::propagate_request_id_layer())
        .layer(middleware::set_request_id_layer())
        .with_state(db)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
