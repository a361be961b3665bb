//! Streaming Chat Orchestrator
//!
//! Drives one backend stream per turn through a fresh [`StreamBuffer`] and
//! hands display-ready fragments to the caller.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{BoxStream, Stream, StreamExt};
use parking_lot::Mutex;

use super::cancel::CancellationSignal;
use crate::backend::{ChatBackend, ChatError, RawFragmentStream};
use crate::messages::Transcript;
use crate::model::{BackendKind, ModelDescriptor};
use crate::thinking::{StreamBuffer, ThinkingMarkerRegistry};

// ============================================================================
// Phase
// ============================================================================

/// Lifecycle of one response
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StreamPhase {
    /// Request issued, nothing received yet
    #[default]
    AwaitingFirstFragment,
    /// Backend fragments are arriving
    Streaming,
    /// Backend finished normally
    Completed,
    /// The caller stopped the response
    Cancelled,
    /// Configuration or backend failure; the last fragment describes it
    Failed,
}

impl StreamPhase {
    /// Whether the response has ended
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingFirstFragment => "awaiting-first-fragment",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Response Stream
// ============================================================================

/// Display fragments for one turn
///
/// Concatenating every fragment in order gives the full text to show. The
/// final fragment is the cancellation marker or error note when the turn did
/// not complete.
pub struct ResponseStream {
    inner: BoxStream<'static, String>,
    phase: Arc<Mutex<StreamPhase>>,
}

impl ResponseStream {
    /// Current lifecycle phase
    #[must_use]
    pub fn phase(&self) -> StreamPhase {
        *self.phase.lock()
    }
}

impl Stream for ResponseStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseStream")
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

fn set_phase(phase: &Mutex<StreamPhase>, next: StreamPhase) {
    *phase.lock() = next;
}

/// Text appended when the reader stops a response
fn cancelled_marker() -> String {
    format!("\n\n{}", ChatError::Cancelled)
}

/// Render a terminal failure as an in-band fragment
fn render_failure(error: &ChatError, produced_content: bool) -> String {
    match (error.is_expected(), produced_content) {
        (true, false) => error.to_string(),
        (true, true) => format!("\n\n{error}"),
        (false, false) => format!("An error occurred: {error}"),
        (false, true) => format!("\n\n[Error: {error}]"),
    }
}

enum Pull {
    Cancelled,
    Next(Option<Result<String, ChatError>>),
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Caller-facing entry point for streaming chat turns
///
/// Holds one backend per [`BackendKind`] and the process-wide thinking
/// marker table. Each [`respond`](Self::respond) call is independent: it
/// owns its buffer and its cancellation signal.
#[derive(Clone)]
pub struct StreamingChatOrchestrator {
    backends: HashMap<BackendKind, Arc<dyn ChatBackend>>,
    markers: Arc<ThinkingMarkerRegistry>,
}

impl StreamingChatOrchestrator {
    /// Create an orchestrator with no backends
    #[must_use]
    pub fn new(markers: ThinkingMarkerRegistry) -> Self {
        Self {
            backends: HashMap::new(),
            markers: Arc::new(markers),
        }
    }

    /// Register a backend under its own kind, replacing any previous one
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn ChatBackend>) -> Self {
        self.backends.insert(backend.kind(), backend);
        self
    }

    /// Backend registered for `kind`
    #[must_use]
    pub fn backend(&self, kind: BackendKind) -> Option<&Arc<dyn ChatBackend>> {
        self.backends.get(&kind)
    }

    /// Thinking marker table in use
    #[must_use]
    pub fn markers(&self) -> &ThinkingMarkerRegistry {
        &self.markers
    }

    fn prepare(
        &self,
        transcript: &Transcript,
        model: Option<&ModelDescriptor>,
    ) -> Result<(RawFragmentStream, StreamBuffer), ChatError> {
        let model = model.ok_or_else(|| {
            ChatError::Configuration("No model is selected.".to_string())
        })?;

        let backend = self.backends.get(&model.backend).ok_or_else(|| {
            ChatError::Configuration(format!("No {} backend is configured.", model.backend))
        })?;
        backend.validate()?;

        let markers = self.markers.lookup(&model.name).cloned();
        tracing::debug!(
            model = %model.name,
            thinking_markers = markers.is_some(),
            "Resolved thinking markers"
        );

        Ok((
            backend.stream_chat(transcript, model),
            StreamBuffer::new(markers),
        ))
    }

    /// Stream a response to `transcript`
    ///
    /// `model` is the caller's snapshot of the active model, fixed for the
    /// whole turn. Nothing is requested until the returned stream is polled.
    /// Failures and cancellation never surface as errors: they end the
    /// stream with a descriptive fragment, and content already produced is
    /// kept.
    pub fn respond(
        &self,
        transcript: &Transcript,
        model: Option<ModelDescriptor>,
        cancel: CancellationSignal,
    ) -> ResponseStream {
        let phase = Arc::new(Mutex::new(StreamPhase::AwaitingFirstFragment));
        let state = Arc::clone(&phase);
        let prepared = self.prepare(transcript, model.as_ref());
        let model_name = model.map(|m| m.name).unwrap_or_default();

        let inner = async_stream::stream! {
            let (mut raw, mut buffer) = match prepared {
                Ok(prepared) => prepared,
                Err(e) => {
                    tracing::warn!(error = %e, "Chat turn rejected before request");
                    set_phase(&state, StreamPhase::Failed);
                    yield e.to_string();
                    return;
                }
            };

            tracing::info!(model = %model_name, "Streaming response");

            let mut produced_content = false;
            let mut terminal: Option<ChatError> = None;

            loop {
                if cancel.is_cancelled() {
                    terminal = Some(ChatError::Cancelled);
                    break;
                }

                let pulled = tokio::select! {
                    biased;
                    () = cancel.cancelled() => Pull::Cancelled,
                    item = raw.next() => Pull::Next(item),
                };

                match pulled {
                    Pull::Cancelled => {
                        terminal = Some(ChatError::Cancelled);
                        break;
                    }
                    Pull::Next(Some(Ok(chunk))) => {
                        if cancel.is_cancelled() {
                            terminal = Some(ChatError::Cancelled);
                            break;
                        }
                        set_phase(&state, StreamPhase::Streaming);
                        for fragment in buffer.process(&chunk) {
                            produced_content = true;
                            yield fragment;
                        }
                    }
                    Pull::Next(Some(Err(e))) => {
                        terminal = Some(e);
                        break;
                    }
                    Pull::Next(None) => break,
                }
            }

            // Release the connection before finalising
            drop(raw);

            for fragment in buffer.flush() {
                produced_content = true;
                yield fragment;
            }

            let outcome = match terminal {
                None => StreamPhase::Completed,
                Some(ChatError::Cancelled) => {
                    set_phase(&state, StreamPhase::Cancelled);
                    yield cancelled_marker();
                    StreamPhase::Cancelled
                }
                Some(e) => {
                    if e.is_expected() {
                        tracing::warn!(model = %model_name, error = ?e, "Backend failed");
                    } else {
                        tracing::error!(model = %model_name, error = %e, "Unexpected stream failure");
                    }
                    set_phase(&state, StreamPhase::Failed);
                    yield render_failure(&e, produced_content);
                    StreamPhase::Failed
                }
            };

            set_phase(&state, outcome);
            tracing::info!(model = %model_name, phase = %outcome, "Response finished");
        };

        ResponseStream {
            inner: Box::pin(inner),
            phase,
        }
    }
}

impl fmt::Debug for StreamingChatOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingChatOrchestrator")
            .field("backends", &self.backends.keys().collect::<Vec<_>>())
            .field("markers", &self.markers.len())
            .finish()
    }
}
