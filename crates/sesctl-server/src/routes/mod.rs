//! API route modules.

pub mod health;
pub mod sessions;

use axum::{Json, Router, routing::get};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

#[derive(Serialize)]
struct Welcome {
    message: &'static str,
    service: &'static str,
    version: &'static str,
}

async fn welcome() -> Json<Welcome> {
    Json(Welcome {
        message: "Session control API",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Create the main router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health::health_check))
        .merge(sessions::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
