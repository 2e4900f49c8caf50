use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

/// Effective generation defaults. Credentials are never included.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfigView {
    pub app: AppInfo,
    pub backend_kind: String,
    pub model_name: String,
    pub max_new_tokens: u32,
    pub temperature: f32,
}
