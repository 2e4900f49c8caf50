//! Core of the parley persona chat service.
//!
//! The crate is organised leaf-first:
//!
//! - [`persona`] loads character cards from a directory.
//! - [`prompt`] turns a system instruction plus a conversation into model input.
//! - [`backend`] holds the text-generation engines behind [`GenerationBackend`].
//! - [`orchestrator`] wires the pieces together for a single chat request.
//!
//! ```rust,no_run
//! use parley_core::{ChatOrchestrator, GenerationRequest, Message, Settings};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let orchestrator = ChatOrchestrator::new(Settings::from_env());
//! let reply = orchestrator
//!     .handle(GenerationRequest::new(vec![Message::user("Pitch a fridge app")]))
//!     .await
//!     .unwrap();
//! println!("{reply}");
//! # }
//! ```

pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod message;
pub mod orchestrator;
pub mod persona;
pub mod prompt;

pub use backend::{BackendKind, GenerationBackend};
pub use catalog::ModelCatalogEntry;
pub use config::Settings;
pub use error::{BackendError, ChatError, ConfigurationError};
pub use message::{Message, Role};
pub use orchestrator::{ChatOrchestrator, GenerationRequest, PreparedChat};
pub use persona::{Persona, PersonaStore, PersonaSummary};
