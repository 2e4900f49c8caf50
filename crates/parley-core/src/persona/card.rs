use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;

use super::Persona;

/// Why a card file was left out of the catalog.
#[derive(Debug, Error)]
pub(crate) enum MalformedCard {
    #[error("failed to read card: {0}")]
    Read(#[from] std::io::Error),

    #[error("card is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("card is not a JSON object")]
    NotAnObject,

    #[error("card has no system prompt")]
    MissingSystemPrompt,
}

/// Read and parse the card at `path`. The file stem supplies a missing id or name.
pub(crate) fn read_card(path: &Path) -> Result<Persona, MalformedCard> {
    let text = std::fs::read_to_string(path)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_card(&stem, &text)
}

/// Parse card JSON, resolving historical field names.
///
/// - `system_prompt`, then `system`, then `prompt`
/// - `greeting`, then `first_mes`
/// - `id` and `name` default to `stem`
pub(crate) fn parse_card(stem: &str, text: &str) -> Result<Persona, MalformedCard> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(fields) = value else {
        return Err(MalformedCard::NotAnObject);
    };

    let system_prompt = first_text(&fields, &["system_prompt", "system", "prompt"])
        .ok_or(MalformedCard::MissingSystemPrompt)?;

    Ok(Persona {
        id: first_text(&fields, &["id"]).unwrap_or_else(|| stem.to_owned()),
        name: first_text(&fields, &["name"]).unwrap_or_else(|| stem.to_owned()),
        description: first_text(&fields, &["description"]).unwrap_or_default(),
        system_prompt,
        greeting: first_text(&fields, &["greeting", "first_mes"]),
        avatar: first_text(&fields, &["avatar"]),
    })
}

/// First of `keys` holding a usable value. Empty strings and `null` are skipped.
fn first_text(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match fields.get(*k)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}
