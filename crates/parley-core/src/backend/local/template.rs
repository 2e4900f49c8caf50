//! Jinja chat templates shipped in Hugging Face `tokenizer_config.json` files.

use minijinja::{context, Environment, Error, ErrorKind, Value};
use tracing::debug;

use crate::message::Message;

/// A model's chat template with the special tokens it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTemplate {
    source: String,
    bos_token: String,
    eos_token: String,
}

impl ChatTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            bos_token: String::new(),
            eos_token: String::new(),
        }
    }

    pub fn with_special_tokens(mut self, bos: impl Into<String>, eos: impl Into<String>) -> Self {
        self.bos_token = bos.into();
        self.eos_token = eos.into();
        self
    }

    /// Extract the template from a parsed `tokenizer_config.json`.
    ///
    /// `chat_template` is either a string or a list of `{name, template}`
    /// entries, in which case the one named `default` (else the first) is used.
    /// Special tokens may be plain strings or `{"content": ...}` objects.
    pub fn from_tokenizer_config(config: &serde_json::Value) -> Option<Self> {
        let source = match config.get("chat_template")? {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Array(entries) => {
                let pick = entries
                    .iter()
                    .find(|e| e.get("name").and_then(|n| n.as_str()) == Some("default"))
                    .or_else(|| entries.first())?;
                pick.get("template")?.as_str()?.to_owned()
            }
            _ => return None,
        };

        Some(Self::new(source).with_special_tokens(
            special_token(config, "bos_token").unwrap_or_default(),
            special_token(config, "eos_token").unwrap_or_default(),
        ))
    }

    /// Render `messages` with the generation prompt appended.
    pub fn render(&self, messages: &[Message]) -> Result<String, Error> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_function("raise_exception", raise_exception);
        env.add_template("chat", &self.source)?;

        let template = env.get_template("chat")?;
        template.render(context! {
            messages => messages,
            add_generation_prompt => true,
            bos_token => &self.bos_token,
            eos_token => &self.eos_token,
        })
    }
}

/// Prompt for a chat-aware model, or `None` when the caller should flatten.
pub(crate) fn render_chat(template: Option<&ChatTemplate>, messages: &[Message]) -> Option<String> {
    let template = template?;
    match template.render(messages) {
        Ok(prompt) => Some(prompt),
        Err(e) => {
            debug!(error = %e, "chat template failed to render; flattening conversation");
            None
        }
    }
}

pub(crate) fn special_token(config: &serde_json::Value, key: &str) -> Option<String> {
    match config.get(key)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(o) => o.get("content")?.as_str().map(str::to_owned),
        _ => None,
    }
}

fn raise_exception(message: String) -> Result<Value, Error> {
    Err(Error::new(ErrorKind::InvalidOperation, message))
}
