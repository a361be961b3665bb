//! Conversation Driver
//!
//! Runs one chat turn end to end: record the user's message, stream the
//! reply into an assistant turn, and persist the session once the reply has
//! ended, however it ended.

use futures::StreamExt;

use crate::messages::{SessionId, Transcript, Turn};
use crate::model::ModelDescriptor;
use crate::session::{SessionError, SessionStore};
use crate::streaming::{CancellationSignal, StreamPhase, StreamingChatOrchestrator};

/// How a turn ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Final phase of the response
    pub phase: StreamPhase,
    /// Full assistant text, including any cancellation or error note
    pub content: String,
}

/// One session's transcript plus its identity
///
/// Turns are serialized by `&mut self`: a conversation can only have one
/// response in flight.
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    id: SessionId,
    transcript: Transcript,
}

impl Conversation {
    /// Start an unsaved conversation with a fresh id
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue a stored session (empty if it cannot be read)
    pub async fn resume(store: &SessionStore, id: SessionId) -> Self {
        let transcript = store.load(&id).await;
        tracing::info!(session = %id, turns = transcript.len(), "Resumed session");
        Self { id, transcript }
    }

    /// Session id
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Turns so far
    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Send `text` and stream the reply
    ///
    /// Each display fragment is appended to the assistant turn and passed to
    /// `on_fragment` as it arrives. Blank input is ignored and returns
    /// `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the session could not be saved; the
    /// transcript in memory is complete either way.
    pub async fn exchange<F>(
        &mut self,
        orchestrator: &StreamingChatOrchestrator,
        model: Option<ModelDescriptor>,
        store: &SessionStore,
        text: &str,
        cancel: CancellationSignal,
        mut on_fragment: F,
    ) -> Result<Option<TurnOutcome>, SessionError>
    where
        F: FnMut(&str),
    {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        self.transcript.push(Turn::user(text));
        let mut response = orchestrator.respond(&self.transcript, model, cancel);
        self.transcript.begin_assistant_turn();

        while let Some(fragment) = response.next().await {
            self.transcript.append_to_last(&fragment);
            on_fragment(&fragment);
        }

        let outcome = TurnOutcome {
            phase: response.phase(),
            content: self
                .transcript
                .last()
                .map(|turn| turn.content.clone())
                .unwrap_or_default(),
        };

        store.save(&self.id, &self.transcript).await?;
        tracing::debug!(session = %self.id, phase = %outcome.phase, "Turn recorded");

        Ok(Some(outcome))
    }
}
