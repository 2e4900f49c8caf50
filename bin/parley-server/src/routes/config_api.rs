//! Effective configuration, minus credentials.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::schemas::config::{AppInfo, ConfigView};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_config), components(schemas(AppInfo, ConfigView)))]
pub struct ConfigApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/config", get(get_config))
}

#[utoipa::path(
    get,
    path = "/config",
    tag = "config",
    responses(
        (status = 200, description = "Application info and generation defaults", body = ConfigView)
    )
)]
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<ConfigView> {
    let core = &state.config.core;
    Json(ConfigView {
        app: AppInfo {
            name: env!("CARGO_PKG_NAME").to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            description: env!("CARGO_PKG_DESCRIPTION").to_owned(),
        },
        backend_kind: core.backend_kind.clone(),
        model_name: core.model_name.clone(),
        max_new_tokens: core.max_new_tokens,
        temperature: core.temperature,
    })
}

#[cfg(test)]
mod test {
    use crate::routes::testing;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn config_reports_defaults_without_credentials() {
        let (status, body) = testing::get("/config").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["app"]["name"], "parley-server");
        assert_eq!(body["backend_kind"], "stub");
        assert_eq!(body["max_new_tokens"], 128);
        assert!(!body.to_string().contains("EMPTY"));
    }
}
