//! Chat Backend Traits
//!
//! Trait definitions for chat backends. This abstraction lets the
//! orchestrator drive Ollama, an OpenAI-compatible API, or a scripted test
//! double without changing the streaming pipeline.
//!
//! # Design Philosophy
//!
//! The `ChatBackend` trait provides a common interface for:
//! - Streaming a chat completion for a full transcript
//! - Checking configuration before any network call
//! - Health checking the backend
//! - Querying available models
//!
//! Implementations handle provider-specific details (endpoints, payloads,
//! wire framing) and translate their failures into [`ChatError`].

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;

use super::error::ChatError;
use crate::messages::{Role, Transcript};
use crate::model::{BackendKind, ModelDescriptor};

/// Lazy sequence of raw text fragments from a backend
///
/// Yields `Ok` fragments in arrival order. A failure is yielded as a single
/// `Err` and the sequence ends after it.
pub type RawFragmentStream = BoxStream<'static, Result<String, ChatError>>;

/// One message in a chat request body
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WireMessage {
    /// `user`, `assistant` or `system`
    pub role: Role,
    /// Message text
    pub content: String,
}

/// Request body shared by the Ollama and OpenAI chat endpoints
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    /// Target model name
    pub model: String,
    /// Full conversation history, oldest first
    pub messages: Vec<WireMessage>,
    /// Always `true`: responses are streamed
    pub stream: bool,
}

impl ChatRequest {
    /// Build a streaming request for a transcript
    #[must_use]
    pub fn streaming(transcript: &Transcript, model: &ModelDescriptor) -> Self {
        Self {
            model: model.name.clone(),
            messages: transcript
                .iter()
                .map(|turn| WireMessage {
                    role: turn.role,
                    content: turn.content.clone(),
                })
                .collect(),
            stream: true,
        }
    }
}

/// Information about an installed model
#[derive(Clone, Debug)]
pub struct ModelInfo {
    /// Model identifier
    pub name: String,
    /// Model size in bytes (if known)
    pub size: Option<u64>,
    /// Parameter count (if known)
    pub parameters: Option<String>,
}

/// Chat Backend trait
///
/// Implement this trait to add support for different LLM providers.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Get the backend name (e.g., "Ollama", "OpenAI")
    fn name(&self) -> &str;

    /// Which [`BackendKind`] this backend serves
    fn kind(&self) -> BackendKind;

    /// URL chat requests are sent to
    fn chat_url(&self) -> String;

    /// Verify the backend is usable before any request is made
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Configuration`] when required settings are missing.
    fn validate(&self) -> Result<(), ChatError> {
        Ok(())
    }

    /// Check if the backend is healthy and reachable
    async fn health_check(&self) -> bool;

    /// Stream a response to `transcript` from `model`
    ///
    /// No I/O happens until the returned stream is first polled. Exactly one
    /// request is issued; failures are not retried.
    fn stream_chat(&self, transcript: &Transcript, model: &ModelDescriptor) -> RawFragmentStream;

    /// List available models
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ChatError>;

    /// Check if a specific model is available
    async fn has_model(&self, model: &str) -> Result<bool, ChatError> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| m.name == model))
    }
}
