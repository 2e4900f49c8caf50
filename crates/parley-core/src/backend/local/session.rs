//! A loaded causal language model and its tokenizer.

use std::fmt;
use std::sync::{Arc, Mutex};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::{llama, qwen2};
use serde_json::Value;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::files::ModelFiles;
use super::template::{special_token, ChatTemplate};
use crate::error::BackendError;

/// Everything the local backend keeps after the first call.
#[derive(Debug)]
pub(crate) struct LoadedModel {
    pub template: Option<ChatTemplate>,
    pub session: Arc<Mutex<TextGenerationSession>>,
}

impl LoadedModel {
    /// Fetch the model files and build the session on the blocking pool.
    pub async fn load(model: &str) -> Result<Self, BackendError> {
        let files = ModelFiles::resolve(model).await?;
        let name = model.to_owned();
        let (session, template) =
            tokio::task::spawn_blocking(move || TextGenerationSession::load(&name, &files))
                .await??;
        Ok(Self {
            template,
            session: Arc::new(Mutex::new(session)),
        })
    }
}

enum CausalModel {
    Llama {
        model: llama::Llama,
        config: llama::Config,
    },
    Qwen2(qwen2::ModelForCausalLM),
}

/// Per-generation decoding state. Llama keeps its KV cache outside the model.
enum Decoder<'a> {
    Llama {
        model: &'a llama::Llama,
        cache: llama::Cache,
    },
    Qwen2(&'a mut qwen2::ModelForCausalLM),
}

impl Decoder<'_> {
    fn forward(&mut self, input: &Tensor, position: usize) -> candle_core::Result<Tensor> {
        match self {
            Decoder::Llama { model, cache } => model.forward(input, position, cache),
            Decoder::Qwen2(model) => model.forward(input, position),
        }
    }
}

impl CausalModel {
    fn decoder(&mut self, device: &Device) -> candle_core::Result<Decoder<'_>> {
        match self {
            CausalModel::Llama { model, config } => Ok(Decoder::Llama {
                model,
                cache: llama::Cache::new(true, DType::F32, config, device)?,
            }),
            CausalModel::Qwen2(model) => {
                model.clear_kv_cache();
                Ok(Decoder::Qwen2(model))
            }
        }
    }
}

pub(crate) struct TextGenerationSession {
    architecture: &'static str,
    model: CausalModel,
    tokenizer: Tokenizer,
    eos_token_ids: Vec<u32>,
    device: Device,
}

impl fmt::Debug for TextGenerationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextGenerationSession")
            .field("architecture", &self.architecture)
            .field("eos_token_ids", &self.eos_token_ids)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl TextGenerationSession {
    /// Build the model from `files`. Blocking: reads and maps the weights.
    fn load(
        model_name: &str,
        files: &ModelFiles,
    ) -> Result<(Self, Option<ChatTemplate>), BackendError> {
        let load_error = |source: anyhow::Error| BackendError::LoadModel {
            model: model_name.to_owned(),
            source,
        };

        let config = read_json(&files.config).map_err(load_error)?;
        let tokenizer_config = match &files.tokenizer_config {
            Some(path) => Some(read_json(path).map_err(load_error)?),
            None => None,
        };

        let device = Device::Cpu;
        // SAFETY: the safetensors files are memory-mapped read-only and are not
        // modified while the session is alive.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&files.weights, DType::F32, &device)? };

        let architecture = config
            .get("model_type")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let (architecture, model) = match architecture {
            "llama" => {
                let cfg: llama::LlamaConfig =
                    serde_json::from_value(config.clone()).map_err(|e| load_error(e.into()))?;
                let config = cfg.into_config(false);
                let model = llama::Llama::load(vb, &config)?;
                ("llama", CausalModel::Llama { model, config })
            }
            "qwen2" => {
                let cfg: qwen2::Config =
                    serde_json::from_value(config.clone()).map_err(|e| load_error(e.into()))?;
                ("qwen2", CausalModel::Qwen2(qwen2::ModelForCausalLM::new(&cfg, vb)?))
            }
            other => return Err(BackendError::UnsupportedArchitecture(other.to_owned())),
        };

        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| load_error(anyhow::anyhow!("failed to read tokenizer: {e}")))?;

        let template = tokenizer_config
            .as_ref()
            .and_then(ChatTemplate::from_tokenizer_config);
        let eos_token_ids = eos_token_ids(&config, tokenizer_config.as_ref(), &tokenizer);

        info!(
            model = model_name,
            architecture,
            chat_template = template.is_some(),
            "local model loaded"
        );

        Ok((
            Self {
                architecture,
                model,
                tokenizer,
                eos_token_ids,
                device,
            },
            template,
        ))
    }

    /// Sample a continuation of `prompt`. Blocking.
    ///
    /// A temperature of zero (or below) decodes greedily. Pass
    /// `add_special_tokens = false` when the prompt already carries BOS.
    pub fn generate(
        &mut self,
        prompt: &str,
        add_special_tokens: bool,
        max_new_tokens: u32,
        temperature: f32,
        seed: u64,
    ) -> Result<String, BackendError> {
        let encoding = self
            .tokenizer
            .encode(prompt, add_special_tokens)
            .map_err(|e| BackendError::Tokenizer(e.to_string()))?;
        let mut tokens = encoding.get_ids().to_vec();
        if tokens.is_empty() {
            return Err(BackendError::Inference("prompt encoded to zero tokens".into()));
        }

        let temperature = (temperature > 0.0).then_some(f64::from(temperature));
        let mut sampler = LogitsProcessor::new(seed, temperature, None);
        let mut decoder = self.model.decoder(&self.device)?;
        let mut generated = Vec::with_capacity(max_new_tokens as usize);

        for step in 0..max_new_tokens as usize {
            let context = if step == 0 { tokens.len() } else { 1 };
            let start = tokens.len() - context;
            let input = Tensor::new(&tokens[start..], &self.device)?.unsqueeze(0)?;
            let logits = decoder
                .forward(&input, start)?
                .flatten_all()?
                .to_dtype(DType::F32)?;

            let next = sampler.sample(&logits)?;
            if self.eos_token_ids.contains(&next) {
                break;
            }
            tokens.push(next);
            generated.push(next);
        }

        debug!(prompt_tokens = encoding.len(), generated = generated.len(), "local generation done");

        let text = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| BackendError::Tokenizer(e.to_string()))?;
        Ok(text.trim().to_owned())
    }
}

fn read_json(path: &std::path::Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// End-of-sequence ids from `config.json` (number or list) and the tokenizer's `eos_token`.
fn eos_token_ids(config: &Value, tokenizer_config: Option<&Value>, tokenizer: &Tokenizer) -> Vec<u32> {
    let mut ids: Vec<u32> = match config.get("eos_token_id") {
        Some(Value::Number(n)) => n.as_u64().into_iter().map(|id| id as u32).collect(),
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(Value::as_u64)
            .map(|id| id as u32)
            .collect(),
        _ => Vec::new(),
    };

    if let Some(id) = tokenizer_config
        .and_then(|c| special_token(c, "eos_token"))
        .and_then(|token| tokenizer.token_to_id(&token))
    {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}
