//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Optional OpenAPI document (disable with `PARLEY_ENABLE_OPENAPI=false`)
//! - Health and config routes
//! - Chat, persona and model routes under `/api`

mod chat;
mod config_api;
pub mod doc;
mod health;
mod models;
mod personas;

use std::sync::Arc;

use axum::routing::get;
use axum::{middleware, Json, Router};

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Routes nested under `/api`.
fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(chat::router())
        .merge(personas::router())
        .merge(models::router())
}

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .merge(config_api::router())
        .nest("/api", api_router());

    if state.config.enable_openapi {
        let api_doc = doc::get_docs();
        app = app.route(
            "/api-docs/openapi.json",
            get(move || {
                let api_doc = api_doc.clone();
                async move { Json(api_doc) }
            }),
        );
    }

    let mut app = app.layer(middleware::from_fn(trace::trace_middleware));
    if state.config.enable_cors {
        app = app.layer(cors::cors_layer(&state));
    }
    app.with_state(state)
}
