//! Streaming Chat Pipeline
//!
//! Turns a transcript into a lazy sequence of display fragments.
//!
//! # Architecture
//!
//! ```text
//! Transcript ──► ChatBackend::stream_chat ──► raw fragments
//!                                                  │
//!                            ThinkingMarkerRegistry│(model base name)
//!                                                  ▼
//!                                            StreamBuffer
//!                                                  │
//!                                                  ▼
//!                         ResponseStream (display fragments) ──► caller
//! ```
//!
//! # Features
//!
//! - **Strict incremental delivery**: fragments are forwarded as soon as the
//!   buffer releases them
//! - **Cooperative cancellation**: a per-turn [`CancellationSignal`] is
//!   checked between fragments and while waiting on the backend
//! - **In-band failures**: errors become the final fragment, after any
//!   content already produced
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use streamchat_core::backend::OllamaBackend;
//! use streamchat_core::messages::{Transcript, Turn};
//! use streamchat_core::model::{BackendKind, ModelDescriptor};
//! use streamchat_core::streaming::{CancellationSignal, StreamingChatOrchestrator};
//! use streamchat_core::thinking::ThinkingMarkerRegistry;
//!
//! # async fn demo() {
//! let orchestrator = StreamingChatOrchestrator::new(ThinkingMarkerRegistry::builtin())
//!     .with_backend(Arc::new(OllamaBackend::default()));
//!
//! let transcript = Transcript::from(vec![Turn::user("Why is the sky blue?")]);
//! let model = ModelDescriptor::new("deepseek-r1:7b", BackendKind::Ollama);
//!
//! let mut response = orchestrator.respond(&transcript, Some(model), CancellationSignal::new());
//! while let Some(fragment) = response.next().await {
//!     print!("{fragment}");
//! }
//! println!("\n[{}]", response.phase());
//! # }
//! ```

mod cancel;
mod orchestrator;

pub use cancel::CancellationSignal;
pub use orchestrator::{ResponseStream, StreamPhase, StreamingChatOrchestrator};
