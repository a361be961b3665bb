//! OpenAI-compatible Backend
//!
//! Chat backend for the OpenAI chat completions API and servers that mimic it.
//!
//! # API
//!
//! - `POST /v1/chat/completions` - streamed as server-sent events
//! - `GET /v1/models` - list models
//!
//! Each event is a `data: {json}` line whose text lives at
//! `choices[0].delta.content`. The stream ends with `data: [DONE]`. Errors are
//! reported as `{"error": {"message": "..."}}`.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;

use super::error::ChatError;
use super::framing::{decode_body, LineEvent};
use super::traits::{ChatBackend, ChatRequest, ModelInfo, RawFragmentStream};
use crate::messages::Transcript;
use crate::model::{BackendKind, ModelDescriptor};

/// Default API base URL
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

const BACKEND_NAME: &str = "OpenAI";

/// OpenAI-compatible backend client
#[derive(Clone)]
pub struct OpenAiBackend {
    base_url: String,
    api_key: Option<String>,
    request_timeout: Duration,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl OpenAiBackend {
    /// Create a new backend; a missing key is reported by [`ChatBackend::validate`]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_timeouts(
            base_url,
            api_key,
            Duration::from_secs(5),
            Duration::from_secs(120),
        )
    }

    /// Create a backend with explicit timeouts
    pub fn with_timeouts(
        base_url: impl Into<String>,
        api_key: Option<String>,
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
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            request_timeout,
            http_client,
        }
    }

    /// Get the base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn models_url(&self) -> String {
        format!("{}/v1/models", self.base_url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Option<Vec<ChunkChoice>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

/// One decoded server-sent event line
#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    /// Comments, blank separators and non-data fields
    Ignored,
    /// A content delta (possibly empty)
    Delta(Option<String>),
    /// `data: [DONE]`
    Done,
}

impl SseLine {
    fn into_event(self) -> LineEvent {
        match self {
            Self::Ignored => LineEvent::skip(),
            Self::Delta(content) => LineEvent {
                content,
                done: false,
            },
            Self::Done => LineEvent {
                content: None,
                done: true,
            },
        }
    }
}

fn parse_sse_line(line: &str) -> Result<SseLine, ChatError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseLine::Ignored);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(SseLine::Ignored);
    }
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }

    let chunk: CompletionChunk = serde_json::from_str(data).map_err(|e| ChatError::Framing {
        backend: BACKEND_NAME.to_string(),
        detail: e.to_string(),
    })?;

    if let Some(error) = chunk.error {
        return Err(ChatError::BackendReported {
            backend: BACKEND_NAME.to_string(),
            detail: error.message,
        });
    }

    let Some(choices) = chunk.choices else {
        return Err(ChatError::Framing {
            backend: BACKEND_NAME.to_string(),
            detail: format!("event has no choices: {data}"),
        });
    };

    Ok(SseLine::Delta(
        choices
            .into_iter()
            .next()
            .and_then(|c| c.delta)
            .and_then(|d| d.content),
    ))
}

fn status_error(status: reqwest::StatusCode, body: &str) -> ChatError {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(String::from)
        });

    if detail.is_none() {
        tracing::warn!(status = %status, body = %body, "OpenAI returned an error status");
    }

    ChatError::BackendReported {
        backend: BACKEND_NAME.to_string(),
        detail,
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn kind(&self) -> BackendKind {
        BackendKind::OpenAi
    }

    fn chat_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn validate(&self) -> Result<(), ChatError> {
        if self.api_key.is_none() {
            return Err(ChatError::Configuration(
                "OPENAI_API_KEY is not set".to_string(),
            ));
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.authorized(self.http_client.get(self.models_url()))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    fn stream_chat(&self, transcript: &Transcript, model: &ModelDescriptor) -> RawFragmentStream {
        let url = self.chat_url();
        let request = self
            .authorized(self.http_client.post(&url))
            .json(&ChatRequest::streaming(transcript, model));

        Box::pin(async_stream::stream! {
            tracing::debug!(url = %url, "Sending chat completion request");

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Chat completion request failed");
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

            let mut fragments = decode_body(response.bytes_stream(), BACKEND_NAME, |line| {
                parse_sse_line(line).map(SseLine::into_event)
            });
            while let Some(fragment) = fragments.next().await {
                yield fragment;
            }
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ChatError> {
        self.validate()?;

        let url = self.models_url();
        let response = self
            .authorized(self.http_client.get(&url))
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

        let mut models: Vec<ModelInfo> = data
            .get("data")
            .and_then(|d| d.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| m.get("id")?.as_str())
                    .map(|id| ModelInfo {
                        name: id.to_string(),
                        size: None,
                        parameters: None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        models.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(models)
    }
}
