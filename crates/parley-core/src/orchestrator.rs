//! Request handling: persona + backend resolution, prompt assembly, dispatch.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::backend::{build_backend, BackendKind, GenerationBackend};
use crate::catalog::{recommended_models, ModelCatalogEntry};
use crate::config::Settings;
use crate::error::ChatError;
use crate::message::Message;
use crate::persona::{Persona, PersonaStore, PersonaSummary};
use crate::prompt;

/// One chat turn to answer. Every optional field falls back to [`Settings`].
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub messages: Vec<Message>,
    pub max_new_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub persona_id: Option<String>,
    pub backend_kind: Option<String>,
    pub model_name: Option<String>,
}

impl GenerationRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_persona(mut self, id: impl Into<String>) -> Self {
        self.persona_id = Some(id.into());
        self
    }

    pub fn with_backend(mut self, kind: impl Into<String>) -> Self {
        self.backend_kind = Some(kind.into());
        self
    }

    pub fn with_model(mut self, name: impl Into<String>) -> Self {
        self.model_name = Some(name.into());
        self
    }

    pub fn with_max_new_tokens(mut self, n: u32) -> Self {
        self.max_new_tokens = Some(n);
        self
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }
}

/// Everything resolved for a request, short of generating.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedChat {
    pub system_instruction: String,
    /// The instruction as a leading `system` turn, then the caller's turns.
    pub messages: Vec<Message>,
    pub backend_kind: BackendKind,
    pub model_name: String,
    pub max_new_tokens: u32,
    pub temperature: f32,
}

type BackendRef = Arc<dyn GenerationBackend>;
type BackendKey = (BackendKind, String);

/// Most backends kept alive at once. Model names come from callers, so the
/// cache must not grow with them.
pub const MAX_CACHED_BACKENDS: usize = 8;

/// Least-recently-used backends, keyed by `(kind, model)`.
#[derive(Debug, Default)]
struct BackendCache {
    entries: HashMap<BackendKey, BackendRef>,
    /// Keys from least to most recently used.
    order: VecDeque<BackendKey>,
}

impl BackendCache {
    fn get_or_insert_with(
        &mut self,
        key: BackendKey,
        build: impl FnOnce() -> BackendRef,
    ) -> BackendRef {
        if let Some(backend) = self.entries.get(&key) {
            let backend = Arc::clone(backend);
            if let Some(pos) = self.order.iter().position(|k| *k == key) {
                self.order.remove(pos);
            }
            self.order.push_back(key);
            return backend;
        }

        while self.entries.len() >= MAX_CACHED_BACKENDS {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            debug!(backend = %oldest.0, model = %oldest.1, "evicting cached backend");
            self.entries.remove(&oldest);
        }

        let backend = build();
        self.entries.insert(key.clone(), Arc::clone(&backend));
        self.order.push_back(key);
        backend
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Routes chat requests to backends.
///
/// Backends are built on first use per `(kind, model)` and reused across
/// requests so their lazily loaded sessions and clients survive. At most
/// [`MAX_CACHED_BACKENDS`] are kept; the least recently used is dropped first.
#[derive(Debug)]
pub struct ChatOrchestrator {
    settings: Settings,
    personas: PersonaStore,
    backends: Mutex<BackendCache>,
    overrides: Mutex<HashMap<BackendKind, BackendRef>>,
}

impl ChatOrchestrator {
    pub fn new(settings: Settings) -> Self {
        let personas = PersonaStore::new(settings.characters_dir.clone());
        Self {
            settings,
            personas,
            backends: Mutex::new(BackendCache::default()),
            overrides: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Serve every request of `kind` with `backend`, whatever model it names.
    pub fn register_backend(&self, kind: BackendKind, backend: BackendRef) {
        self.overrides
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, backend);
    }

    /// The selected persona's instruction, else the configured default.
    ///
    /// An unknown persona id is not an error.
    pub fn resolve_system_instruction(&self, persona_id: Option<&str>) -> String {
        if let Some(id) = persona_id {
            match self.personas.get(id) {
                Some(persona) => return persona.system_prompt,
                None => debug!(persona_id = id, "unknown persona; using default instruction"),
            }
        }
        prompt::load_system_prompt(&self.settings.system_prompt_path)
    }

    /// The backend serving `(kind, model)`: a registered override, else a
    /// cached instance, else a newly built one.
    pub fn resolve_backend(&self, kind: BackendKind, model_name: &str) -> BackendRef {
        if let Some(backend) = self
            .overrides
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
        {
            return Arc::clone(backend);
        }

        self.backends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert_with((kind, model_name.to_owned()), || {
                debug!(backend = %kind, model = model_name, "constructing backend");
                build_backend(kind, model_name, &self.settings)
            })
    }

    #[cfg(test)]
    fn cached_backends(&self) -> usize {
        self.backends.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Resolve everything `request` needs without invoking a backend.
    ///
    /// The backend kind is checked first so an unknown label fails before any
    /// persona or file lookup. A zero token budget or a negative (or
    /// non-finite) temperature falls back to the configured default.
    pub fn prepare(&self, request: &GenerationRequest) -> Result<PreparedChat, ChatError> {
        let kind_label =
            non_blank(&request.backend_kind).unwrap_or(self.settings.backend_kind.as_str());
        let backend_kind = BackendKind::resolve(kind_label)?;

        let model_name = non_blank(&request.model_name)
            .unwrap_or(self.settings.model_name.as_str())
            .to_owned();

        let max_new_tokens = request
            .max_new_tokens
            .filter(|&n| n > 0)
            .unwrap_or(self.settings.max_new_tokens);
        let temperature = request
            .temperature
            .filter(|t| t.is_finite() && *t >= 0.0)
            .unwrap_or(self.settings.temperature);

        let system_instruction = self.resolve_system_instruction(non_blank(&request.persona_id));
        let messages = prompt::build_messages(&system_instruction, &request.messages);

        Ok(PreparedChat {
            system_instruction,
            messages,
            backend_kind,
            model_name,
            max_new_tokens,
            temperature,
        })
    }

    /// Answer one chat request.
    pub async fn handle(&self, request: GenerationRequest) -> Result<String, ChatError> {
        let prepared = self.prepare(&request)?;
        let backend = self.resolve_backend(prepared.backend_kind, &prepared.model_name);

        info!(
            backend = %prepared.backend_kind,
            model = %prepared.model_name,
            persona = request.persona_id.as_deref().unwrap_or("-"),
            turns = request.messages.len(),
            max_new_tokens = prepared.max_new_tokens,
            temperature = prepared.temperature,
            "dispatching chat request"
        );

        match backend
            .generate_from_messages(
                &prepared.messages,
                prepared.max_new_tokens,
                prepared.temperature,
            )
            .await
        {
            Ok(reply) => {
                debug!(chars = reply.len(), "chat reply generated");
                Ok(reply)
            }
            Err(e) => {
                warn!(backend = %prepared.backend_kind, error = %e, "generation failed");
                Err(e.into())
            }
        }
    }

    pub fn list_personas(&self) -> Vec<PersonaSummary> {
        self.personas.summaries()
    }

    pub fn get_persona(&self, id: &str) -> Option<Persona> {
        self.personas.get(id)
    }

    pub fn model_catalog(&self) -> &'static [ModelCatalogEntry] {
        recommended_models()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::backend::stub::STUB_REPLY;
    use crate::error::{BackendError, ConfigurationError};
    use crate::prompt::DEFAULT_SYSTEM_PROMPT;

    const IDEAS_GUY: &str = r#"{
        "id": "ideas_guy",
        "name": "Ideas Guy",
        "description": "Overconfident, rapid-fire ideas.",
        "system_prompt": "You are the Ideas Guy. Pitch boldly."
    }"#;

    /// Settings using the stub backend, a persona directory and no instruction file.
    fn settings_in(dir: &Path) -> Settings {
        Settings {
            characters_dir: dir.join("characters"),
            system_prompt_path: dir.join("missing.system.md"),
            ..Settings::stub()
        }
    }

    fn with_persona_dir(cards: &[(&str, &str)]) -> (tempfile::TempDir, ChatOrchestrator) {
        let dir = tempfile::tempdir().unwrap();
        let characters = dir.path().join("characters");
        std::fs::create_dir(&characters).unwrap();
        for (name, body) in cards {
            std::fs::write(characters.join(name), body).unwrap();
        }
        let orchestrator = ChatOrchestrator::new(settings_in(dir.path()));
        (dir, orchestrator)
    }

    #[derive(Debug, Default)]
    struct Counting {
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GenerationBackend for Counting {
        fn kind(&self) -> BackendKind {
            BackendKind::Stub
        }

        async fn generate(&self, prompt: &str, _: u32, _: f32) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_owned());
            Ok("counted".into())
        }
    }

    #[derive(Debug)]
    struct Failing;

    #[async_trait]
    impl GenerationBackend for Failing {
        fn kind(&self) -> BackendKind {
            BackendKind::Remote
        }

        async fn generate(&self, _: &str, _: u32, _: f32) -> Result<String, BackendError> {
            Err(BackendError::RemoteStatus {
                status: 503,
                body: "overloaded".into(),
            })
        }
    }

    #[tokio::test]
    async fn stub_backend_returns_canned_reply() {
        let (_dir, orchestrator) = with_persona_dir(&[]);
        let reply = orchestrator
            .handle(GenerationRequest::new(vec![Message::user("Pitch a fridge app")]))
            .await
            .unwrap();
        assert_eq!(reply, STUB_REPLY);
    }

    #[tokio::test]
    async fn persona_instruction_is_used() {
        let (_dir, orchestrator) = with_persona_dir(&[("ideas_guy.json", IDEAS_GUY)]);
        let request =
            GenerationRequest::new(vec![Message::user("Pitch a fridge app")]).with_persona("ideas_guy");

        let prepared = orchestrator.prepare(&request).unwrap();
        assert_eq!(prepared.system_instruction, "You are the Ideas Guy. Pitch boldly.");
        assert_eq!(
            prepared.messages,
            vec![
                Message::system("You are the Ideas Guy. Pitch boldly."),
                Message::user("Pitch a fridge app"),
            ]
        );

        assert_eq!(orchestrator.handle(request).await.unwrap(), STUB_REPLY);
    }

    #[test]
    fn prompt_only_card_is_listed_with_that_prompt() {
        let (_dir, orchestrator) =
            with_persona_dir(&[("legacy.json", r#"{"id":"legacy","prompt":"Old style."}"#)]);
        let persona = orchestrator.get_persona("legacy").unwrap();
        assert_eq!(persona.system_prompt, "Old style.");
        assert_eq!(orchestrator.list_personas()[0].id, "legacy");
    }

    #[tokio::test]
    async fn unknown_backend_fails_before_dispatch() {
        let (_dir, orchestrator) = with_persona_dir(&[]);
        let counting = Arc::new(Counting::default());
        orchestrator.register_backend(BackendKind::Stub, counting.clone());

        let err = orchestrator
            .handle(GenerationRequest::new(vec![Message::user("hi")]).with_backend("gpt-infinity"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ChatError::Configuration(ConfigurationError::UnknownBackend(ref k)) if k == "gpt-infinity"
        ));
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_configured_backend_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            backend_kind: "mainframe".into(),
            ..settings_in(dir.path())
        };
        let err = ChatOrchestrator::new(settings)
            .handle(GenerationRequest::new(vec![Message::user("hi")]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown backend kind: mainframe");
    }

    #[tokio::test]
    async fn backend_failure_becomes_generation_error() {
        let (_dir, orchestrator) = with_persona_dir(&[]);
        orchestrator.register_backend(BackendKind::Remote, Arc::new(Failing));

        let err = orchestrator
            .handle(GenerationRequest::new(vec![Message::user("hi")]).with_backend("vllm"))
            .await
            .unwrap_err();

        let ChatError::Generation { message } = err else {
            panic!("expected generation failure");
        };
        assert!(message.contains("503"));
        assert!(message.contains("overloaded"));
    }

    #[tokio::test]
    async fn registered_backend_sees_flattened_persona_prompt() {
        let (_dir, orchestrator) = with_persona_dir(&[("ideas_guy.json", IDEAS_GUY)]);
        let counting = Arc::new(Counting::default());
        orchestrator.register_backend(BackendKind::Stub, counting.clone());

        let reply = orchestrator
            .handle(GenerationRequest::new(vec![Message::user("hi")]).with_persona("ideas_guy"))
            .await
            .unwrap();
        assert_eq!(reply, "counted");
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *counting.prompts.lock().unwrap(),
            vec![prompt::build_prompt(
                "You are the Ideas Guy. Pitch boldly.",
                &[Message::user("hi")]
            )]
        );
    }

    #[test]
    fn default_instruction_comes_from_file_or_literal() {
        let (dir, orchestrator) = with_persona_dir(&[]);
        assert_eq!(orchestrator.resolve_system_instruction(None), DEFAULT_SYSTEM_PROMPT);
        assert_eq!(
            orchestrator.resolve_system_instruction(Some("nobody")),
            DEFAULT_SYSTEM_PROMPT
        );

        std::fs::write(dir.path().join("missing.system.md"), "  From the file.\n").unwrap();
        assert_eq!(orchestrator.resolve_system_instruction(None), "From the file.");
    }

    #[test]
    fn sampling_parameters_fall_back_to_defaults() {
        let (_dir, orchestrator) = with_persona_dir(&[]);
        let defaults = orchestrator.settings().clone();

        let prepared = orchestrator
            .prepare(
                &GenerationRequest::new(vec![])
                    .with_max_new_tokens(0)
                    .with_temperature(-1.0),
            )
            .unwrap();
        assert_eq!(prepared.max_new_tokens, defaults.max_new_tokens);
        assert_eq!(prepared.temperature, defaults.temperature);
        assert_eq!(prepared.model_name, defaults.model_name);
        assert_eq!(prepared.backend_kind, BackendKind::Stub);

        let prepared = orchestrator
            .prepare(
                &GenerationRequest::new(vec![])
                    .with_max_new_tokens(16)
                    .with_temperature(0.0)
                    .with_model("tiny")
                    .with_backend("OpenAI"),
            )
            .unwrap();
        assert_eq!(prepared.max_new_tokens, 16);
        assert_eq!(prepared.temperature, 0.0);
        assert_eq!(prepared.model_name, "tiny");
        assert_eq!(prepared.backend_kind, BackendKind::Remote);
    }

    #[test]
    fn backends_are_cached_per_kind_and_model() {
        let (_dir, orchestrator) = with_persona_dir(&[]);
        let a = orchestrator.resolve_backend(BackendKind::Remote, "m1");
        let b = orchestrator.resolve_backend(BackendKind::Remote, "m1");
        let c = orchestrator.resolve_backend(BackendKind::Remote, "m2");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(c.kind(), BackendKind::Remote);
    }

    #[tokio::test]
    async fn caller_supplied_model_names_do_not_grow_the_cache() {
        let (_dir, orchestrator) = with_persona_dir(&[]);
        for i in 0..5000 {
            let reply = orchestrator
                .handle(
                    GenerationRequest::new(vec![Message::user("hi")]).with_model(format!("junk-{i}")),
                )
                .await
                .unwrap();
            assert_eq!(reply, STUB_REPLY);
        }
        assert_eq!(orchestrator.cached_backends(), MAX_CACHED_BACKENDS);
    }

    #[test]
    fn recently_used_backend_survives_eviction() {
        let (_dir, orchestrator) = with_persona_dir(&[]);
        let first = orchestrator.resolve_backend(BackendKind::Stub, "keep");
        for i in 0..MAX_CACHED_BACKENDS * 3 {
            orchestrator.resolve_backend(BackendKind::Stub, &format!("other-{i}"));
            // Touch it so it is never the least recently used.
            orchestrator.resolve_backend(BackendKind::Stub, "keep");
        }
        let again = orchestrator.resolve_backend(BackendKind::Stub, "keep");
        assert!(Arc::ptr_eq(&first, &again));

        let dropped = orchestrator.resolve_backend(BackendKind::Stub, "other-0");
        assert_eq!(dropped.kind(), BackendKind::Stub);
        assert!(orchestrator.cached_backends() <= MAX_CACHED_BACKENDS);
    }

    #[test]
    fn catalog_is_exposed() {
        let (_dir, orchestrator) = with_persona_dir(&[]);
        assert!(orchestrator.model_catalog().iter().any(|m| m.id == "stub"));
    }
}
