//! Recommended model catalog.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::schemas::models::ModelView;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(list_models), components(schemas(ModelView)))]
pub struct ModelsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/models", get(list_models))
}

#[utoipa::path(
    get,
    path = "/api/models",
    tag = "models",
    responses(
        (status = 200, description = "Recommended models per backend", body = Vec<ModelView>)
    )
)]
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<Vec<ModelView>> {
    Json(
        state
            .orchestrator
            .model_catalog()
            .iter()
            .map(ModelView::from)
            .collect(),
    )
}
