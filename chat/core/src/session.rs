//! Session Persistence
//!
//! Stores each conversation as one JSON file so it can be listed and resumed
//! later.
//!
//! # Design Philosophy
//!
//! Loading never fails: a missing, unreadable or malformed file yields an
//! empty transcript (or the valid prefix of one) and a warning, so a damaged
//! history never blocks a new conversation. Saving reports failures, since
//! losing a turn silently is worse than telling the user.
//!
//! # File Format
//!
//! ```json
//! {
//!     "session_id": "20250101_120000_123_UTC",
//!     "title": "What is the capital of Fran...",
//!     "created_at": "2025-01-01T12:00:00.123Z",
//!     "updated_at": "2025-01-01T12:00:04.456Z",
//!     "memory": [
//!         {"role": "user", "content": "What is the capital of France?"},
//!         {"role": "assistant", "content": "Paris."}
//!     ]
//! }
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::messages::{Role, SessionId, Transcript};

/// Default directory for session files
pub const DEFAULT_SESSION_DIR: &str = "sessions_history";

/// Default number of sessions shown by [`SessionStore::list`]
pub const DEFAULT_LIST_LIMIT: usize = 10;

/// Characters of the first user message used as a title
const TITLE_CHARS: usize = 30;

/// Errors writing a session
#[derive(Debug, Error)]
pub enum SessionError {
    /// Filesystem failure
    #[error("Failed to write session file {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Transcript could not be encoded
    #[error("Failed to encode session: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// On-disk representation of a session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier
    pub session_id: String,
    /// Human-readable title
    pub title: String,
    /// When the session was first saved
    pub created_at: DateTime<Utc>,
    /// When the session was last saved
    pub updated_at: DateTime<Utc>,
    /// Conversation turns, oldest first
    pub memory: Transcript,
}

/// One entry of a session listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    /// Session identifier (file stem)
    pub id: SessionId,
    /// Stored title
    pub title: String,
}

/// Title for a session that has none stored yet
#[must_use]
pub fn generate_title(id: &SessionId, transcript: &Transcript) -> String {
    match transcript.first() {
        Some(turn) if turn.role == Role::User => {
            let head: String = turn.content.chars().take(TITLE_CHARS).collect();
            if head.trim().is_empty() {
                format!("Chat Session {id}")
            } else {
                format!("{head}...")
            }
        }
        Some(turn) => format!("Chat ({})", turn.role),
        None => format!("Chat Session {id}"),
    }
}

/// Directory of JSON session files
#[derive(Clone, Debug)]
pub struct SessionStore {
    dir: PathBuf,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_DIR)
    }
}

impl SessionStore {
    /// Create a store rooted at `dir`; the directory is created on first save
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the session files
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a session id
    ///
    /// Only the final path component of the id is used, so an id can never
    /// point outside the store.
    #[must_use]
    pub fn path_for(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.json", id.file_stem()))
    }

    /// Whether a session file exists
    pub async fn exists(&self, id: &SessionId) -> bool {
        tokio::fs::try_exists(self.path_for(id))
            .await
            .unwrap_or(false)
    }

    /// Read a file as JSON, logging and swallowing any failure
    async fn read_json(&self, path: &Path) -> Option<Value> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read session file");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Session file is not valid JSON");
                None
            }
        }
    }

    /// Load a session's transcript
    ///
    /// Returns an empty transcript if the file is missing or malformed, and
    /// the valid prefix if an element of `memory` is not a proper turn.
    pub async fn load(&self, id: &SessionId) -> Transcript {
        let path = self.path_for(id);
        let Some(value) = self.read_json(&path).await else {
            return Transcript::new();
        };

        let Some(items) = value.get("memory").and_then(Value::as_array) else {
            tracing::warn!(path = %path.display(), "Session file has no memory list");
            return Transcript::new();
        };

        let (transcript, problem) = Transcript::from_values_prefix(items);
        if let Some(e) = problem {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                kept = transcript.len(),
                "Session history truncated at invalid turn"
            );
        }

        tracing::debug!(session = %id, turns = transcript.len(), "Loaded session");
        transcript
    }

    /// Write a session's transcript
    ///
    /// The title and creation time of an existing file are kept; the
    /// modification time is refreshed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub async fn save(&self, id: &SessionId, transcript: &Transcript) -> Result<(), SessionError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| SessionError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.path_for(id);
        let existing = self.read_json(&path).await;
        let stored_title = existing
            .as_ref()
            .and_then(|v| v.get("title"))
            .and_then(Value::as_str)
            .map(String::from);
        let stored_created = existing
            .as_ref()
            .and_then(|v| v.get("created_at"))
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let now = Utc::now();
        let record = SessionRecord {
            session_id: id.to_string(),
            title: stored_title.unwrap_or_else(|| generate_title(id, transcript)),
            created_at: stored_created.unwrap_or(now),
            updated_at: now,
            memory: transcript.clone(),
        };

        let mut encoded = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut encoded, formatter);
        record.serialize(&mut serializer)?;

        // Write then rename so a crash never leaves a half-written file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &encoded)
            .await
            .map_err(|source| SessionError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| SessionError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(session = %id, turns = transcript.len(), "Saved session");
        Ok(())
    }

    /// Most recently modified sessions first, at most `limit`
    pub async fn list(&self, limit: usize) -> Vec<SessionSummary> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to list sessions");
                }
                return Vec::new();
            }
        };

        let mut files = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read session directory entry");
                    break;
                }
            };

            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let modified = entry
                .metadata()
                .await
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            files.push((modified, SessionId::from(stem), path));
        }

        files.sort_by(|a, b| b.0.cmp(&a.0));
        files.truncate(limit);

        let mut summaries = Vec::with_capacity(files.len());
        for (_, id, path) in files {
            let title = self
                .read_json(&path)
                .await
                .and_then(|v| v.get("title").and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| format!("Chat Session {id}"));
            summaries.push(SessionSummary { id, title });
        }
        summaries
    }
}
