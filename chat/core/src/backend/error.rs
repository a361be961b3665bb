//! Streaming failure taxonomy
//!
//! Every variant's `Display` text is what the reader sees in the transcript:
//! failures are delivered in-band as the final fragment of a response rather
//! than raised past the orchestrator.

use thiserror::Error;

/// Why a streaming turn could not complete normally
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ChatError {
    /// The backend could not be reached at all
    #[error("Error: Could not connect to {backend} at {endpoint}. Is it running?")]
    Connectivity {
        /// Backend display name
        backend: String,
        /// URL the request was sent to
        endpoint: String,
    },

    /// A response line could not be decoded or lacked expected fields
    #[error("Error: Unexpected response format from {backend}.")]
    Framing {
        /// Backend display name
        backend: String,
        /// What was wrong, for logs
        detail: String,
    },

    /// The backend answered with an error payload or failure status
    #[error(
        "Error communicating with {backend}: {}",
        .detail.as_deref().unwrap_or("the request failed")
    )]
    BackendReported {
        /// Backend display name
        backend: String,
        /// The backend's own error text, if one could be extracted
        detail: Option<String>,
    },

    /// No usable model or backend is configured
    #[error("Error: {0}")]
    Configuration(String),

    /// The reader stopped the response
    #[error("[Response was stopped early]")]
    Cancelled,

    /// The connection failed unexpectedly after the request was accepted
    #[error("{backend} stream failed: {detail}")]
    Transport {
        /// Backend display name
        backend: String,
        /// Underlying error text
        detail: String,
    },
}

impl ChatError {
    /// Whether this is one of the anticipated, typed backend failures
    ///
    /// Anything else reaching the orchestrator is treated as unexpected.
    #[must_use]
    pub fn is_expected(&self) -> bool {
        !matches!(self, Self::Transport { .. })
    }

    /// Classify a reqwest error raised while sending a request
    pub(crate) fn from_send_error(backend: &str, endpoint: &str, err: &reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Connectivity {
                backend: backend.to_string(),
                endpoint: endpoint.to_string(),
            }
        } else {
            Self::Transport {
                backend: backend.to_string(),
                detail: err.to_string(),
            }
        }
    }
}
