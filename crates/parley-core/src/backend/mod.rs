//! Text-generation backends.
//!
//! Every engine implements [`GenerationBackend`]. Engines that only complete
//! free text implement [`generate`](GenerationBackend::generate) and inherit
//! the flattening [`generate_from_messages`](GenerationBackend::generate_from_messages);
//! chat-aware engines override the latter.
//!
//! | Kind     | Labels                               | Engine                  |
//! |----------|--------------------------------------|-------------------------|
//! | `stub`   | `stub`                               | [`StubBackend`]         |
//! | `local`  | `local`, `huggingface`, `hf`, `candle` | [`LocalPipelineBackend`] |
//! | `remote` | `remote`, `vllm`, `openai`           | [`RemoteChatBackend`]   |

pub mod local;
pub mod remote;
pub mod stub;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use strum::{Display, EnumString};

use crate::config::Settings;
use crate::error::{BackendError, ConfigurationError};
use crate::message::Message;
use crate::prompt;

pub use local::LocalPipelineBackend;
pub use remote::RemoteChatBackend;
pub use stub::StubBackend;

/// Which engine family serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum BackendKind {
    #[strum(to_string = "stub")]
    Stub,
    #[strum(to_string = "local", serialize = "huggingface", serialize = "hf", serialize = "candle")]
    Local,
    #[strum(to_string = "remote", serialize = "vllm", serialize = "openai")]
    Remote,
}

impl BackendKind {
    /// Parse a configured or requested backend label.
    pub fn resolve(label: &str) -> Result<Self, ConfigurationError> {
        label
            .trim()
            .parse()
            .map_err(|_| ConfigurationError::UnknownBackend(label.to_owned()))
    }
}

/// A text-generation engine.
///
/// Implementations must be cheap to construct: heavy resources are built on
/// first use, at most once.
#[async_trait]
pub trait GenerationBackend: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> BackendKind;

    /// Complete `prompt`, returning only the newly generated text.
    async fn generate(
        &self,
        prompt: &str,
        max_new_tokens: u32,
        temperature: f32,
    ) -> Result<String, BackendError>;

    /// Reply to a structured conversation. Defaults to [`flatten_and_generate`].
    async fn generate_from_messages(
        &self,
        messages: &[Message],
        max_new_tokens: u32,
        temperature: f32,
    ) -> Result<String, BackendError> {
        flatten_and_generate(self, messages, max_new_tokens, temperature).await
    }
}

/// Encode `messages` as a flattened prompt and hand it to `backend.generate`.
///
/// Leading `system` turns become the prompt's instruction.
pub async fn flatten_and_generate<B>(
    backend: &B,
    messages: &[Message],
    max_new_tokens: u32,
    temperature: f32,
) -> Result<String, BackendError>
where
    B: GenerationBackend + ?Sized,
{
    let (instruction, conversation) = prompt::split_system(messages);
    let text = prompt::build_prompt(&instruction, conversation);
    backend.generate(&text, max_new_tokens, temperature).await
}

/// Construct a backend of `kind` serving `model_name`.
///
/// Nothing is loaded or connected here; see [`GenerationBackend`].
pub fn build_backend(
    kind: BackendKind,
    model_name: &str,
    settings: &Settings,
) -> Arc<dyn GenerationBackend> {
    match kind {
        BackendKind::Stub => Arc::new(StubBackend),
        BackendKind::Local => Arc::new(LocalPipelineBackend::new(model_name, settings.sampling_seed)),
        BackendKind::Remote => Arc::new(RemoteChatBackend::from_settings(settings, model_name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records the prompt it was asked to complete.
    #[derive(Debug, Default)]
    struct Echo {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GenerationBackend for Echo {
        fn kind(&self) -> BackendKind {
            BackendKind::Stub
        }

        async fn generate(&self, prompt: &str, _: u32, _: f32) -> Result<String, BackendError> {
            self.seen.lock().unwrap().push(prompt.to_owned());
            Ok("echo".into())
        }
    }

    #[test]
    fn kind_labels_resolve() {
        assert_eq!(BackendKind::resolve("stub").unwrap(), BackendKind::Stub);
        assert_eq!(BackendKind::resolve("HuggingFace").unwrap(), BackendKind::Local);
        assert_eq!(BackendKind::resolve(" local ").unwrap(), BackendKind::Local);
        assert_eq!(BackendKind::resolve("vllm").unwrap(), BackendKind::Remote);
        assert_eq!(BackendKind::resolve("OpenAI").unwrap(), BackendKind::Remote);
    }

    #[test]
    fn unknown_kind_is_configuration_error() {
        let err = BackendKind::resolve("gpt-infinity").unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownBackend(ref k) if k == "gpt-infinity"));
    }

    #[test]
    fn kind_displays_canonical_label() {
        assert_eq!(BackendKind::Local.to_string(), "local");
        assert_eq!(serde_json::to_value(BackendKind::Remote).unwrap(), "remote");
    }

    #[tokio::test]
    async fn default_generate_from_messages_flattens() {
        let echo = Echo::default();
        let msgs = prompt::build_messages("Be bold.", &[Message::user("Pitch a fridge app")]);

        let reply = echo.generate_from_messages(&msgs, 16, 0.5).await.unwrap();
        assert_eq!(reply, "echo");

        let seen = echo.seen.lock().unwrap();
        assert_eq!(
            seen[0],
            prompt::build_prompt("Be bold.", &[Message::user("Pitch a fridge app")])
        );
    }

    #[test]
    fn build_backend_reports_requested_kind() {
        let settings = Settings::default();
        for kind in [BackendKind::Stub, BackendKind::Local, BackendKind::Remote] {
            assert_eq!(build_backend(kind, "m", &settings).kind(), kind);
        }
    }
}
