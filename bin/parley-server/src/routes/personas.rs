//! Persona catalog routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::persona::{PersonaSummaryView, PersonaView};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_characters, get_character),
    components(schemas(PersonaSummaryView, PersonaView))
)]
pub struct PersonasApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/characters", get(list_characters))
        .route("/characters/{id}", get(get_character))
}

#[utoipa::path(
    get,
    path = "/api/characters",
    tag = "characters",
    responses(
        (status = 200, description = "All usable personas", body = Vec<PersonaSummaryView>)
    )
)]
pub async fn list_characters(State(state): State<Arc<AppState>>) -> Json<Vec<PersonaSummaryView>> {
    Json(
        state
            .orchestrator
            .list_personas()
            .into_iter()
            .map(PersonaSummaryView::from)
            .collect(),
    )
}

#[utoipa::path(
    get,
    path = "/api/characters/{id}",
    tag = "characters",
    params(("id" = String, Path, description = "Persona id")),
    responses(
        (status = 200, description = "The full character card", body = PersonaView),
        (status = 404, description = "No persona with that id"),
    )
)]
pub async fn get_character(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PersonaView>, ServerError> {
    state
        .orchestrator
        .get_persona(&id)
        .map(|p| Json(p.into()))
        .ok_or_else(|| ServerError::NotFound(format!("persona '{id}' not found")))
}
