//! Static list of models worth trying with each backend.

use serde::Serialize;

use crate::backend::BackendKind;

/// One recommended model. Purely informational: requests may name any model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelCatalogEntry {
    /// Model identifier passed to the backend as `model_name`.
    pub id: &'static str,
    pub display_name: &'static str,
    pub backend_kind: BackendKind,
    pub note: &'static str,
}

const RECOMMENDED: &[ModelCatalogEntry] = &[
    // Served by a separately started OpenAI-compatible server (vLLM, llama.cpp).
    ModelCatalogEntry {
        id: "TinyLlama/TinyLlama-1.1B-Chat-v1.0",
        display_name: "TinyLlama 1.1B Chat",
        backend_kind: BackendKind::Remote,
        note: "Small instruct model; good for demos",
    },
    ModelCatalogEntry {
        id: "Qwen/Qwen2.5-0.5B-Instruct",
        display_name: "Qwen2.5 0.5B Instruct",
        backend_kind: BackendKind::Remote,
        note: "Very small instruct model",
    },
    // CPU-friendly models the local backend can load.
    ModelCatalogEntry {
        id: "Qwen/Qwen2.5-0.5B-Instruct",
        display_name: "Qwen2.5 0.5B Instruct (local)",
        backend_kind: BackendKind::Local,
        note: "Runs in-process on CPU; about 2 GB of f32 weights",
    },
    ModelCatalogEntry {
        id: "TinyLlama/TinyLlama-1.1B-Chat-v1.0",
        display_name: "TinyLlama 1.1B Chat (local)",
        backend_kind: BackendKind::Local,
        note: "Llama architecture; slower on CPU",
    },
    ModelCatalogEntry {
        id: "stub",
        display_name: "Stub Replies",
        backend_kind: BackendKind::Stub,
        note: "Fast, deterministic",
    },
];

pub fn recommended_models() -> &'static [ModelCatalogEntry] {
    RECOMMENDED
}
