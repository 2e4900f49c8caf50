//! OpenAI-compatible chat-completion client (vLLM, llama.cpp server, OpenAI).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{BackendKind, GenerationBackend};
use crate::config::Settings;
use crate::error::BackendError;
use crate::message::Message;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// ── Backend ───────────────────────────────────────────────────────────────────

/// Chat backend talking to a remote `/chat/completions` endpoint.
#[derive(Debug)]
pub struct RemoteChatBackend {
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    client: OnceCell<Client>,
}

impl RemoteChatBackend {
    /// `base_url` includes the API prefix, e.g. `http://localhost:8000/v1`.
    /// An empty `api_key` sends no `Authorization` header.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
            client: OnceCell::new(),
        }
    }

    pub fn from_settings(settings: &Settings, model: &str) -> Self {
        Self::new(
            settings.remote_base_url.as_str(),
            settings.remote_api_key.as_str(),
            model,
        )
        .with_timeout(Duration::from_secs(settings.remote_timeout_secs))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether the HTTP client has been built yet.
    pub fn is_connected(&self) -> bool {
        self.client.initialized()
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    async fn client(&self) -> Result<&Client, BackendError> {
        self.client
            .get_or_try_init(|| async {
                info!(base_url = %self.base_url, model = %self.model, "building remote chat client");
                Client::builder()
                    .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
                    .timeout(self.timeout)
                    .build()
                    .map_err(BackendError::ClientBuild)
            })
            .await
    }
}

#[async_trait]
impl GenerationBackend for RemoteChatBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn generate(
        &self,
        prompt: &str,
        max_new_tokens: u32,
        temperature: f32,
    ) -> Result<String, BackendError> {
        self.generate_from_messages(&[Message::user(prompt)], max_new_tokens, temperature)
            .await
    }

    async fn generate_from_messages(
        &self,
        messages: &[Message],
        max_new_tokens: u32,
        temperature: f32,
    ) -> Result<String, BackendError> {
        let client = self.client().await?;
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature,
            max_tokens: max_new_tokens,
        };

        debug!(endpoint = %self.endpoint(), turns = messages.len(), "sending chat completion");

        let mut request = client.post(self.endpoint()).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(BackendError::RemoteStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::MalformedResponse("response has no choices".into()))?;

        Ok(choice
            .message
            .and_then(|m| m.content)
            .map(|c| c.trim().to_owned())
            .unwrap_or_default())
    }
}
