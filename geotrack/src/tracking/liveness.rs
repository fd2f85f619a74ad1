//! Liveness tokens and the delivery seam.
//!
//! Every start attempt gets a fresh [`Liveness`]. Stopping or restarting
//! revokes it, and every asynchronous completion (permission result, settings
//! outcome, push batch, poll result) presents its token before touching
//! tracker state. A revoked token means the completion belongs to a session
//! that no longer exists and its result is discarded.

use tokio_util::sync::CancellationToken;

use super::error::TrackingError;
use super::sample::LocationSample;

/// Liveness token for one start attempt.
#[derive(Debug, Clone)]
pub struct Liveness {
    generation: u64,
    token: CancellationToken,
}

impl Liveness {
    pub(crate) fn new(generation: u64) -> Self {
        Self {
            generation,
            token: CancellationToken::new(),
        }
    }

    /// Attempt counter this token was issued for.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// False once the owning attempt was stopped or superseded.
    pub fn is_alive(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Resolves when the token is revoked.
    pub async fn revoked(&self) {
        self.token.cancelled().await
    }

    /// A token that is revoked with this one, but can also be revoked alone.
    pub(crate) fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub(crate) fn revoke(&self) {
        self.token.cancel();
    }
}

/// Where the delivery paths hand their samples.
///
/// Implementations must reject samples whose liveness token is no longer
/// current with [`TrackingError::TeardownRace`].
pub trait SampleSink: Send + Sync {
    /// Forward a sample to the consumer.
    fn deliver(&self, sample: LocationSample, liveness: &Liveness) -> Result<(), TrackingError>;

    /// Whether anyone would receive a delivered sample.
    fn has_listener(&self) -> bool;
}
