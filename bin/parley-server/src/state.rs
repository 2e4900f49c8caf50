//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use parley_core::ChatOrchestrator;

use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Persona lookup, backend cache and dispatch.
    pub orchestrator: Arc<ChatOrchestrator>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let orchestrator = ChatOrchestrator::new(config.core.clone());
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
        }
    }
}
