//! Conversation Data Model
//!
//! Role-tagged turns and the ordered transcript they form.
//!
//! # Design Philosophy
//!
//! A [`Transcript`] is the single source of truth for one session. It is
//! append-only while a turn is in flight: the only in-place mutation allowed
//! is growing the content of the final assistant turn while its response is
//! still streaming. Untyped data (JSON loaded from disk) is validated once, at
//! the transcript boundary, so the rest of the crate only ever sees
//! well-formed [`Turn`]s.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Who authored a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User input
    User,
    /// Model response
    Assistant,
    /// System instruction
    System,
}

impl Role {
    /// Wire name used by backends and session files
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = TranscriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(TranscriptError::UnknownRole(other.to_string())),
        }
    }
}

/// One role-tagged message in a conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who sent this turn
    pub role: Role,
    /// Turn text
    pub content: String,
}

impl Turn {
    /// Create a new turn
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a system turn
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Validate an untyped JSON value as a turn
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an object, lacks a `role` or
    /// `content` field, names an unknown role, or carries non-string content.
    pub fn from_value(value: &Value) -> Result<Self, TranscriptError> {
        let obj = value.as_object().ok_or(TranscriptError::NotAnObject)?;
        let role = obj
            .get("role")
            .ok_or(TranscriptError::MissingField("role"))?
            .as_str()
            .ok_or(TranscriptError::WrongType("role"))?
            .parse::<Role>()?;
        let content = obj
            .get("content")
            .ok_or(TranscriptError::MissingField("content"))?
            .as_str()
            .ok_or(TranscriptError::WrongType("content"))?;
        Ok(Self::new(role, content))
    }
}

/// Reasons an untyped turn fails validation
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TranscriptError {
    /// Element is not a JSON object
    #[error("turn is not an object")]
    NotAnObject,
    /// Required field is absent
    #[error("turn is missing the `{0}` field")]
    MissingField(&'static str),
    /// Field is present but not a string
    #[error("turn field `{0}` is not a string")]
    WrongType(&'static str),
    /// Role name is not one of user/assistant/system
    #[error("unknown role `{0}`")]
    UnknownRole(String),
    /// Turn at a given position failed validation
    #[error("invalid turn at index {index}: {reason}")]
    InvalidTurn {
        /// Position in the source list
        index: usize,
        /// Why it was rejected
        reason: Box<TranscriptError>,
    },
}

/// Ordered sequence of turns for one session
///
/// Order is creation order and is never rearranged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Create an empty transcript
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a list of untyped turns, rejecting the whole list on the
    /// first invalid element
    ///
    /// # Errors
    ///
    /// Returns [`TranscriptError::InvalidTurn`] naming the first bad index.
    pub fn try_from_values(values: &[Value]) -> Result<Self, TranscriptError> {
        match Self::from_values_prefix(values) {
            (transcript, None) => Ok(transcript),
            (_, Some(err)) => Err(err),
        }
    }

    /// Validate a list of untyped turns, keeping the valid prefix
    ///
    /// Stops at the first invalid element and reports why alongside the
    /// turns accepted so far.
    #[must_use]
    pub fn from_values_prefix(values: &[Value]) -> (Self, Option<TranscriptError>) {
        let mut turns = Vec::with_capacity(values.len());
        for (index, value) in values.iter().enumerate() {
            match Turn::from_value(value) {
                Ok(turn) => turns.push(turn),
                Err(reason) => {
                    return (
                        Self { turns },
                        Some(TranscriptError::InvalidTurn {
                            index,
                            reason: Box::new(reason),
                        }),
                    );
                }
            }
        }
        (Self { turns }, None)
    }

    /// Append a turn
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Append an empty assistant turn whose content will grow while streaming
    pub fn begin_assistant_turn(&mut self) {
        self.turns.push(Turn::assistant(String::new()));
    }

    /// Grow the content of the final turn
    ///
    /// Returns `false` if the transcript is empty.
    pub fn append_to_last(&mut self, text: &str) -> bool {
        match self.turns.last_mut() {
            Some(turn) => {
                turn.content.push_str(text);
                true
            }
            None => false,
        }
    }

    /// All turns in creation order
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The most recent turn
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// The first turn
    #[must_use]
    pub fn first(&self) -> Option<&Turn> {
        self.turns.first()
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether there are no turns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Iterate over turns
    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }
}

impl From<Vec<Turn>> for Transcript {
    fn from(turns: Vec<Turn>) -> Self {
        Self { turns }
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

/// Session identifier
///
/// New ids are UTC timestamps with millisecond precision, e.g.
/// `20250101_120000_123_UTC`, so they sort chronologically.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new session ID from the current time
    #[must_use]
    pub fn new() -> Self {
        Self(
            chrono::Utc::now()
                .format("%Y%m%d_%H%M%S_%3f_UTC")
                .to_string(),
        )
    }

    /// Borrow the raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id reduced to its final path component, safe to use as a file stem
    ///
    /// An id ending in a separator has no final component; its separators are
    /// replaced with `_` instead so it still maps to a non-empty stem.
    #[must_use]
    pub fn file_stem(&self) -> Cow<'_, str> {
        let last = self.0.rsplit(['/', '\\']).next().unwrap_or_default();
        if !last.is_empty() {
            return Cow::Borrowed(last);
        }

        let sanitized: String = self
            .0
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        if sanitized.is_empty() {
            Cow::Borrowed("_")
        } else {
            Cow::Owned(sanitized)
        }
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
