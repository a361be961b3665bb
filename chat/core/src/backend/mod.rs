//! LLM Backend Integration
//!
//! This module provides abstracted access to chat backends (Ollama,
//! OpenAI-compatible APIs) through a common trait interface.
//!
//! # Available Backends
//!
//! - **Ollama**: Local LLM server (default), newline-delimited JSON
//! - **OpenAI**: Chat completions API, server-sent events
//!
//! # Usage
//!
//! ```no_run
//! use futures::StreamExt;
//! use streamchat_core::backend::{ChatBackend, OllamaBackend};
//! use streamchat_core::messages::{Transcript, Turn};
//! use streamchat_core::model::{BackendKind, ModelDescriptor};
//!
//! # async fn demo() {
//! let backend = OllamaBackend::default();
//! let transcript = Transcript::from(vec![Turn::user("Hello!")]);
//! let model = ModelDescriptor::new("gemma3:1b", BackendKind::Ollama);
//!
//! let mut fragments = backend.stream_chat(&transcript, &model);
//! while let Some(fragment) = fragments.next().await {
//!     match fragment {
//!         Ok(text) => print!("{text}"),
//!         Err(e) => eprintln!("{e}"),
//!     }
//! }
//! # }
//! ```

mod error;
mod framing;
mod ollama;
mod openai;
mod traits;

pub use error::ChatError;
pub use ollama::{OllamaBackend, DEFAULT_OLLAMA_URL};
pub use openai::{OpenAiBackend, DEFAULT_OPENAI_URL};
pub use traits::{ChatBackend, ChatRequest, ModelInfo, RawFragmentStream, WireMessage};
