//! Ollama Backend Implementation
//!
//! Chat backend for Ollama (local LLM server).
//!
//! # Ollama API
//!
//! - `POST /api/chat` - chat completion over the full message history
//! - `GET /api/tags` - list installed models
//!
//! With `"stream": true` the chat response body is newline-delimited JSON.
//! Each line looks like
//! `{"message": {"role": "assistant", "content": "Hel"}, "done": false}`
//! and the final line carries `"done": true`. Failures arrive as
//! `{"error": "..."}`, either as the whole body of a non-2xx response or as a
//! line mid-stream.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;

use super::error::ChatError;
use super::framing::{decode_body, LineEvent};
use super::traits::{ChatBackend, ChatRequest, ModelInfo, RawFragmentStream};
use crate::messages::Transcript;
use crate::model::{BackendKind, ModelDescriptor};

/// Default Ollama server address
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

const BACKEND_NAME: &str = "Ollama";

/// Ollama backend client
#[derive(Clone, Debug)]
pub struct OllamaBackend {
    /// Base URL, e.g. `http://localhost:11434`
    base_url: String,
    /// Timeout for non-streaming calls
    request_timeout: Duration,
    /// HTTP client
    http_client: reqwest::Client,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeouts(base_url, Duration::from_secs(5), Duration::from_secs(120))
    }

    /// Create a backend with explicit timeouts
    ///
    /// `connect_timeout` bounds connection setup for every request;
    /// `request_timeout` bounds model listing and health checks. Streaming
    /// chat responses have no overall deadline.
    pub fn with_timeouts(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url,
            request_timeout,
            http_client,
        }
    }

    /// Get the base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get tags endpoint URL
    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_URL)
    }
}

/// One line of a streamed `/api/chat` response
#[derive(Debug, Deserialize)]
struct ChatChunk {
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    content: Option<String>,
}

/// Decode one response line
///
/// Blank lines carry nothing. A line with neither `message.content` nor
/// `done: true` is malformed.
fn parse_line(line: &str) -> Result<LineEvent, ChatError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(LineEvent::skip());
    }

    let chunk: ChatChunk = serde_json::from_str(line).map_err(|e| ChatError::Framing {
        backend: BACKEND_NAME.to_string(),
        detail: e.to_string(),
    })?;

    if let Some(error) = chunk.error {
        return Err(ChatError::BackendReported {
            backend: BACKEND_NAME.to_string(),
            detail: Some(error),
        });
    }

    let content = chunk.message.and_then(|m| m.content);
    if content.is_none() && !chunk.done {
        return Err(ChatError::Framing {
            backend: BACKEND_NAME.to_string(),
            detail: format!("line has no message.content: {line}"),
        });
    }

    Ok(LineEvent {
        content,
        done: chunk.done,
    })
}

/// Build the error for a non-2xx response, preferring the body's `error` text
fn status_error(status: reqwest::StatusCode, body: &str) -> ChatError {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from));

    if detail.is_none() {
        tracing::warn!(status = %status, body = %body, "Ollama returned an error status");
    }

    ChatError::BackendReported {
        backend: BACKEND_NAME.to_string(),
        detail,
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Ollama
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    async fn health_check(&self) -> bool {
        self.http_client
            .get(self.tags_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    fn stream_chat(&self, transcript: &Transcript, model: &ModelDescriptor) -> RawFragmentStream {
        let client = self.http_client.clone();
        let url = self.chat_url();
        let request = ChatRequest::streaming(transcript, model);

        Box::pin(async_stream::stream! {
            tracing::debug!(
                url = %url,
                model = %request.model,
                messages = request.messages.len(),
                "Sending chat request"
            );

            let response = match client.post(&url).json(&request).send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Chat request failed");
                    yield Err(ChatError::from_send_error(BACKEND_NAME, &url, &e));
                    return;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                yield Err(status_error(status, &body));
                return;
            }

            let mut fragments = decode_body(response.bytes_stream(), BACKEND_NAME, parse_line);
            while let Some(fragment) = fragments.next().await {
                yield fragment;
            }
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ChatError> {
        let url = self.tags_url();
        let response = self
            .http_client
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| ChatError::from_send_error(BACKEND_NAME, &url, &e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let data: serde_json::Value = response.json().await.map_err(|e| ChatError::Framing {
            backend: BACKEND_NAME.to_string(),
            detail: e.to_string(),
        })?;

        let models = data
            .get("models")
            .and_then(|m| m.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| {
                        let name = m.get("name")?.as_str()?.to_string();
                        let size = m.get("size").and_then(serde_json::Value::as_u64);
                        let parameters = m
                            .get("details")
                            .and_then(|d| d.get("parameter_size"))
                            .and_then(|p| p.as_str())
                            .map(String::from);

                        Some(ModelInfo {
                            name,
                            size,
                            parameters,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }
}
