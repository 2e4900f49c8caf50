use utoipa::OpenApi;

use crate::routes::{chat, config_api, health, models, personas};

#[derive(OpenApi)]
#[openapi(info(
    title = "parley-server",
    description = "Persona chat API",
    version = "0.1.0",
    contact(name = "parley", url = "https://github.com/parley-rs/parley")
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(config_api::ConfigApi::openapi());
    root.merge(chat::ChatApi::openapi());
    root.merge(personas::PersonasApi::openapi());
    root.merge(models::ModelsApi::openapi());
    root
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::routes::testing;
    use axum::http::StatusCode;

    #[test]
    fn document_lists_every_route() {
        let doc = get_docs();
        for path in [
            "/health",
            "/config",
            "/api/chat",
            "/api/characters",
            "/api/characters/{id}",
            "/api/models",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[tokio::test]
    async fn document_is_served() {
        let (status, body) = testing::get("/api-docs/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["info"]["title"], "parley-server");
    }
}
