//! In-process generation with [candle](https://github.com/huggingface/candle).
//!
//! The model named by the backend is either a local directory holding
//! `config.json`, `tokenizer.json` and safetensors weights, or a Hugging Face
//! Hub repo id that is downloaded into the hub cache on first use. Llama and
//! Qwen2 architectures are supported.
//!
//! Without the `candle` feature the backend still constructs, but every
//! generation fails with [`BackendError::Unavailable`].

pub mod template;

#[cfg(feature = "candle")]
mod files;
#[cfg(feature = "candle")]
mod session;

use async_trait::async_trait;
use tracing::debug;

use super::{flatten_and_generate, BackendKind, GenerationBackend};
use crate::error::BackendError;
use crate::message::Message;

/// Local text-generation pipeline, loaded lazily on the first request.
#[derive(Debug)]
pub struct LocalPipelineBackend {
    model_name: String,
    seed: Option<u64>,
    #[cfg(feature = "candle")]
    loaded: tokio::sync::OnceCell<session::LoadedModel>,
}

impl LocalPipelineBackend {
    /// `seed` fixes sampling; `None` seeds from the clock on each call.
    pub fn new(model_name: impl Into<String>, seed: Option<u64>) -> Self {
        Self {
            model_name: model_name.into(),
            seed,
            #[cfg(feature = "candle")]
            loaded: tokio::sync::OnceCell::new(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Whether the model has been loaded yet.
    pub fn is_loaded(&self) -> bool {
        #[cfg(feature = "candle")]
        {
            self.loaded.initialized()
        }
        #[cfg(not(feature = "candle"))]
        {
            false
        }
    }

    #[cfg(feature = "candle")]
    fn seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default()
        })
    }
}

/// Where a prompt handed to the tokenizer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptSource {
    /// Caller text or a flattened conversation.
    Text,
    /// Rendered by the model's chat template, which already emits BOS and
    /// the other special tokens it needs.
    ChatTemplate,
}

impl PromptSource {
    #[cfg_attr(not(feature = "candle"), allow(dead_code))]
    fn add_special_tokens(self) -> bool {
        matches!(self, PromptSource::Text)
    }
}

#[cfg(feature = "candle")]
impl LocalPipelineBackend {
    async fn model(&self) -> Result<&session::LoadedModel, BackendError> {
        self.loaded
            .get_or_try_init(|| async {
                tracing::info!(model = %self.model_name, "loading local model");
                session::LoadedModel::load(&self.model_name).await
            })
            .await
    }

    async fn run_generate(
        &self,
        prompt: &str,
        source: PromptSource,
        max_new_tokens: u32,
        temperature: f32,
    ) -> Result<String, BackendError> {
        let session = self.model().await?.session.clone();
        let prompt = prompt.to_owned();
        let seed = self.seed();
        let add_special_tokens = source.add_special_tokens();

        tokio::task::spawn_blocking(move || {
            let mut session = session
                .lock()
                .map_err(|_| BackendError::Inference("generation session lock poisoned".into()))?;
            session.generate(&prompt, add_special_tokens, max_new_tokens, temperature, seed)
        })
        .await?
    }

    /// The conversation rendered with the model's own chat template, if any.
    async fn chat_prompt(&self, messages: &[Message]) -> Result<Option<String>, BackendError> {
        let loaded = self.model().await?;
        Ok(template::render_chat(loaded.template.as_ref(), messages))
    }
}

#[cfg(not(feature = "candle"))]
impl LocalPipelineBackend {
    async fn run_generate(
        &self,
        _: &str,
        _: PromptSource,
        _: u32,
        _: f32,
    ) -> Result<String, BackendError> {
        Err(BackendError::Unavailable(format!(
            "local backend for {} requires the `candle` feature",
            self.model_name
        )))
    }

    async fn chat_prompt(&self, _: &[Message]) -> Result<Option<String>, BackendError> {
        Ok(None)
    }
}

#[async_trait]
impl GenerationBackend for LocalPipelineBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn generate(
        &self,
        prompt: &str,
        max_new_tokens: u32,
        temperature: f32,
    ) -> Result<String, BackendError> {
        self.run_generate(prompt, PromptSource::Text, max_new_tokens, temperature)
            .await
    }

    /// Uses the model's chat template when it has one and it renders;
    /// otherwise flattens the conversation.
    async fn generate_from_messages(
        &self,
        messages: &[Message],
        max_new_tokens: u32,
        temperature: f32,
    ) -> Result<String, BackendError> {
        match self.chat_prompt(messages).await? {
            Some(prompt) => {
                debug!(model = %self.model_name, "using model chat template");
                self.run_generate(&prompt, PromptSource::ChatTemplate, max_new_tokens, temperature)
                    .await
            }
            None => flatten_and_generate(self, messages, max_new_tokens, temperature).await,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn construction_loads_nothing() {
        let backend = LocalPipelineBackend::new("Qwen/Qwen2.5-0.5B-Instruct", Some(7));
        assert_eq!(backend.kind(), BackendKind::Local);
        assert_eq!(backend.model_name(), "Qwen/Qwen2.5-0.5B-Instruct");
        assert!(!backend.is_loaded());
    }

    #[test]
    fn only_plain_text_prompts_get_special_tokens() {
        assert!(PromptSource::Text.add_special_tokens());
        assert!(!PromptSource::ChatTemplate.add_special_tokens());
    }

    #[cfg(feature = "candle")]
    #[test]
    fn fixed_seed_is_reused() {
        let backend = LocalPipelineBackend::new("m", Some(42));
        assert_eq!(backend.seed(), 42);
        assert_eq!(backend.seed(), 42);
    }

    #[cfg(feature = "candle")]
    #[tokio::test]
    async fn missing_model_directory_files_fail_generation() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalPipelineBackend::new(dir.path().to_string_lossy(), Some(1));

        let err = backend.generate("hi", 4, 0.0).await.unwrap_err();
        assert!(matches!(err, BackendError::ModelFetch { .. }));
        assert!(!backend.is_loaded());
    }

    #[cfg(not(feature = "candle"))]
    #[tokio::test]
    async fn generation_requires_candle() {
        let backend = LocalPipelineBackend::new("m", None);
        let err = backend.generate("hi", 4, 0.0).await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
    }
}
