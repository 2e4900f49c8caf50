use parley_core::ModelCatalogEntry;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A recommended model and the backend that serves it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelView {
    pub id: String,
    pub display_name: String,
    /// `stub`, `local` or `remote`.
    pub backend_kind: String,
    pub note: String,
}

impl From<&ModelCatalogEntry> for ModelView {
    fn from(m: &ModelCatalogEntry) -> Self {
        Self {
            id: m.id.to_owned(),
            display_name: m.display_name.to_owned(),
            backend_kind: m.backend_kind.to_string(),
            note: m.note.to_owned(),
        }
    }
}
