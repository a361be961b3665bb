//! Per-turn cancellation

use tokio_util::sync::CancellationToken;

/// Cooperative stop request for one in-flight response
///
/// Clones share state: cancelling any clone cancels them all. Create one per
/// turn so stopping a response never affects another session.
#[derive(Clone, Debug, Default)]
pub struct CancellationSignal {
    token: CancellationToken,
}

impl CancellationSignal {
    /// Create an untriggered signal
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the response stop
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether a stop has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once a stop has been requested
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}
