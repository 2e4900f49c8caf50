//! Locating model files on disk or in the Hugging Face Hub cache.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use hf_hub::api::tokio::{ApiBuilder, ApiRepo};
use tracing::info;

use crate::error::BackendError;

const CONFIG: &str = "config.json";
const TOKENIZER: &str = "tokenizer.json";
const TOKENIZER_CONFIG: &str = "tokenizer_config.json";
const SINGLE_WEIGHTS: &str = "model.safetensors";
const WEIGHTS_INDEX: &str = "model.safetensors.index.json";

/// Paths of everything needed to build a generation session.
#[derive(Debug, Clone)]
pub(crate) struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub tokenizer_config: Option<PathBuf>,
    pub weights: Vec<PathBuf>,
}

impl ModelFiles {
    /// `model` is either a local directory or a Hub repo id such as
    /// `Qwen/Qwen2.5-0.5B-Instruct`.
    pub async fn resolve(model: &str) -> Result<Self, BackendError> {
        let dir = Path::new(model);
        if dir.is_dir() {
            return Self::from_dir(model, dir);
        }
        Self::download(model).await
    }

    fn from_dir(model: &str, dir: &Path) -> Result<Self, BackendError> {
        let require = |name: &str| {
            let path = dir.join(name);
            if path.is_file() {
                Ok(path)
            } else {
                Err(BackendError::ModelFetch {
                    model: model.to_owned(),
                    message: format!("{name} not found in {}", dir.display()),
                })
            }
        };

        let config = require(CONFIG)?;
        let tokenizer = require(TOKENIZER)?;
        let tokenizer_config = Some(dir.join(TOKENIZER_CONFIG)).filter(|p| p.is_file());

        let weights = match require(SINGLE_WEIGHTS) {
            Ok(single) => vec![single],
            Err(_) => {
                let index = require(WEIGHTS_INDEX)?;
                shard_names(model, &index)?
                    .into_iter()
                    .map(|name| require(name.as_str()))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(Self {
            config,
            tokenizer,
            tokenizer_config,
            weights,
        })
    }

    async fn download(model: &str) -> Result<Self, BackendError> {
        info!(model, "fetching model files from the hub");
        let api = ApiBuilder::new()
            .with_progress(false)
            .build()
            .map_err(|e| fetch_error(model, e))?;
        let repo = api.model(model.to_owned());

        let config = get(&repo, model, CONFIG).await?;
        let tokenizer = get(&repo, model, TOKENIZER).await?;
        let tokenizer_config = repo.get(TOKENIZER_CONFIG).await.ok();

        let weights = match repo.get(SINGLE_WEIGHTS).await {
            Ok(single) => vec![single],
            Err(_) => {
                let index = get(&repo, model, WEIGHTS_INDEX).await?;
                let mut shards = Vec::new();
                for name in shard_names(model, &index)? {
                    shards.push(get(&repo, model, &name).await?);
                }
                shards
            }
        };

        Ok(Self {
            config,
            tokenizer,
            tokenizer_config,
            weights,
        })
    }
}

async fn get(repo: &ApiRepo, model: &str, name: &str) -> Result<PathBuf, BackendError> {
    repo.get(name).await.map_err(|e| fetch_error(model, e))
}

fn fetch_error(model: &str, e: impl std::fmt::Display) -> BackendError {
    BackendError::ModelFetch {
        model: model.to_owned(),
        message: e.to_string(),
    }
}

/// Distinct shard file names listed in a safetensors index, sorted.
fn shard_names(model: &str, index: &Path) -> Result<Vec<String>, BackendError> {
    let text = std::fs::read_to_string(index).map_err(|e| fetch_error(model, e))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| fetch_error(model, e))?;
    let map = value
        .get("weight_map")
        .and_then(|m| m.as_object())
        .ok_or_else(|| fetch_error(model, "weight index has no weight_map"))?;

    let names: BTreeSet<String> = map
        .values()
        .filter_map(|v| v.as_str().map(str::to_owned))
        .collect();
    Ok(names.into_iter().collect())
}
