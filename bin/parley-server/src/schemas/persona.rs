use parley_core::{Persona, PersonaSummary};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Public listing entry for a persona.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PersonaSummaryView {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Path or URL of the persona's picture.
    pub avatar: Option<String>,
}

/// A full character card.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PersonaView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub greeting: Option<String>,
    pub avatar: Option<String>,
}

impl From<PersonaSummary> for PersonaSummaryView {
    fn from(p: PersonaSummary) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            avatar: p.avatar,
        }
    }
}

impl From<Persona> for PersonaView {
    fn from(p: Persona) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            system_prompt: p.system_prompt,
            greeting: p.greeting,
            avatar: p.avatar,
        }
    }
}
