//! Character cards.
//!
//! A persona is a named system instruction plus presentation fields. Cards
//! live on disk as one JSON file each and are read by [`PersonaStore`].

mod card;
mod store;

use serde::{Deserialize, Serialize};

pub use store::PersonaStore;

/// A loaded character card. `system_prompt` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub greeting: Option<String>,
    /// Path or URL of the persona's picture.
    pub avatar: Option<String>,
}

/// Public view of a persona: the instruction and greeting are withheld.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub avatar: Option<String>,
}

impl From<Persona> for PersonaSummary {
    fn from(p: Persona) -> Self {
        PersonaSummary {
            id: p.id,
            name: p.name,
            description: p.description,
            avatar: p.avatar,
        }
    }
}
