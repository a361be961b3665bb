//! Streamchat Core - Headless Streaming Chat Pipeline
//!
//! This crate turns a conversation transcript into an incrementally
//! delivered, display-ready response from a local or remote LLM. It is
//! independent of any front-end: a terminal REPL, a web UI or a test harness
//! all consume the same lazy fragment stream.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Front-end                               │
//! │        (CLI REPL, tests, anything that renders text)             │
//! └───────────────┬───────────────────────────────▲──────────────────┘
//!                 │ user text                     │ display fragments
//! ┌───────────────▼───────────────────────────────┴──────────────────┐
//! │                        Conversation                              │
//! │   Transcript ──► StreamingChatOrchestrator ──► SessionStore      │
//! │                   │             ▲                                │
//! │                   ▼             │                                │
//! │            ChatBackend    StreamBuffer ◄── ThinkingMarkerRegistry│
//! │         (Ollama / OpenAI)                                        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`StreamingChatOrchestrator`]: drives one backend stream per turn
//! - [`StreamBuffer`]: rewrites thinking delimiters across chunk boundaries
//! - [`ThinkingMarkerRegistry`]: per-model delimiter table
//! - [`ChatBackend`]: streaming adapter trait ([`OllamaBackend`], [`OpenAiBackend`])
//! - [`Conversation`]: one session's turns, streamed and persisted
//! - [`SessionStore`]: JSON session files
//! - [`ModelCatalog`]: installed models and the current selection
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use streamchat_core::{
//!     CancellationSignal, ChatBackend, Conversation, ModelCatalog, OllamaBackend,
//!     SessionStore, StreamingChatOrchestrator, ThinkingMarkerRegistry,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend: Arc<dyn ChatBackend> = Arc::new(OllamaBackend::default());
//!     let catalog = ModelCatalog::discover(backend.as_ref(), Some("gemma3:1b")).await;
//!     let orchestrator =
//!         StreamingChatOrchestrator::new(ThinkingMarkerRegistry::builtin()).with_backend(backend);
//!     let store = SessionStore::default();
//!
//!     let mut conversation = Conversation::new();
//!     conversation
//!         .exchange(
//!             &orchestrator,
//!             catalog.current(),
//!             &store,
//!             "Hello!",
//!             CancellationSignal::new(),
//!             |fragment| print!("{fragment}"),
//!         )
//!         .await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod conversation;
pub mod messages;
pub mod model;
pub mod session;
pub mod streaming;
pub mod thinking;

// Re-exports for convenience
pub use backend::{ChatBackend, ChatError, ModelInfo, OllamaBackend, OpenAiBackend};
pub use config::{
    default_config_path, load_config, load_config_from_path, ChatConfig, ConfigError,
    ConfigOverrides, ConfigSource,
};
pub use conversation::{Conversation, TurnOutcome};
pub use messages::{Role, SessionId, Transcript, TranscriptError, Turn};
pub use model::{BackendKind, ModelCatalog, ModelDescriptor};
pub use session::{SessionError, SessionRecord, SessionStore, SessionSummary};
pub use streaming::{CancellationSignal, ResponseStream, StreamPhase, StreamingChatOrchestrator};
pub use thinking::{StreamBuffer, ThinkingMarkerRegistry, ThinkingMarkerSpec};
