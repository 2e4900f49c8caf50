use parley_core::{GenerationRequest, Message};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// A single conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    /// `"system"`, `"user"` or `"assistant"`; anything else is treated as `"user"`.
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct ChatRequest {
    /// Conversation so far, oldest first.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature in [0, 2]. Defaults to the server setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f32>,
    /// Generation budget in tokens, 1 to 4096. Defaults to the server setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 4096))]
    pub max_new_tokens: Option<i64>,
    /// Persona whose instruction steers the reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<String>,
    /// `stub`, `local` or `remote` (or one of their aliases).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_kind: Option<String>,
    /// Model id for the selected backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

/// Response body for `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub reply: String,
}

impl From<ChatRequest> for GenerationRequest {
    /// Call after validation: `max_new_tokens` is assumed to be in range.
    fn from(req: ChatRequest) -> Self {
        GenerationRequest {
            messages: req
                .messages
                .into_iter()
                .map(|m| Message::new(m.role.as_str(), m.content))
                .collect(),
            max_new_tokens: req.max_new_tokens.and_then(|n| u32::try_from(n).ok()),
            temperature: req.temperature,
            persona_id: req.persona_id,
            backend_kind: req.backend_kind,
            model_name: req.model_name,
        }
    }
}
