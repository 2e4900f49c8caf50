use thiserror::Error;

/// The request or the process configuration names something that does not exist.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("unknown backend kind: {0}")]
    UnknownBackend(String),
}

/// A generation backend failed to produce text.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("remote request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("remote server returned {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    #[error("malformed remote response: {0}")]
    MalformedResponse(String),

    #[error("failed to fetch model files for {model}: {message}")]
    ModelFetch { model: String, message: String },

    #[error("failed to load model {model}")]
    LoadModel {
        model: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unsupported model architecture: {0}")]
    UnsupportedArchitecture(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("local inference failed: {0}")]
    Inference(String),

    #[error("local inference worker panicked or was cancelled")]
    WorkerJoin(#[from] tokio::task::JoinError),

    #[error("{0}")]
    Unavailable(String),
}

#[cfg(feature = "candle")]
impl From<candle_core::Error> for BackendError {
    fn from(e: candle_core::Error) -> Self {
        BackendError::Inference(e.to_string())
    }
}

/// Errors that cross the core boundary.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Any backend failure, carrying the backend's description.
    #[error("generation failed: {message}")]
    Generation { message: String },
}

impl From<BackendError> for ChatError {
    fn from(e: BackendError) -> Self {
        ChatError::Generation {
            message: describe(&e),
        }
    }
}

/// Render an error and its source chain as `outer: inner: ...`.
fn describe(e: &dyn std::error::Error) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = inner.source();
    }
    out
}
