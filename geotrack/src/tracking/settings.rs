//! Settings Resolver.
//!
//! Verifies that device location settings can satisfy a [`LocationRequest`]
//! before any subscription is opened. When they cannot, the platform may hand
//! back a [`ResolutionToken`] that a UI collaborator presents to the user
//! (for example an "enable GPS" prompt). The resolver never draws UI itself.
//!
//! # Flow
//!
//! ```text
//! check ──► Satisfied ─────────────────────────────► Satisfied
//!       ──► ResolutionRequired ──► present ──► no ──► Unresolved(ResolutionDeclined)
//!                                         ──► yes ─► check again
//!                                                     ──► Satisfied ──► Satisfied
//!                                                     ──► otherwise ──► Unresolved
//!       ──► Unresolvable(e) ───────────────────────► Unresolved(e)
//! ```
//!
//! A second check after an accepted resolution mirrors how the device can
//! still be misconfigured after the user returns from the settings screen.
//! There is no retry loop: one re-check, then the outcome is final.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::error::SettingsError;
use super::liveness::Liveness;
use super::provider::LocationRequest;

/// Opaque capability for a user-mediated settings change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionToken(String);

impl ResolutionToken {
    /// Wrap a platform-specific resolution id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The platform-specific id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResolutionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a single settings-check round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsOutcome {
    /// Settings already meet the request.
    Satisfied,
    /// The user can fix the settings through the given resolution.
    ResolutionRequired(ResolutionToken),
    /// The settings cannot be fixed.
    Unresolvable(SettingsError),
}

/// Platform settings client plus the UI that presents resolutions.
pub trait SettingsCollaborator: Send + Sync {
    /// Check device settings against the request.
    fn check_settings(&self, request: LocationRequest) -> BoxFuture<'_, SettingsOutcome>;

    /// Show the resolution UI. Resolves to true if the user accepted.
    fn present_resolution(&self, token: ResolutionToken) -> BoxFuture<'_, bool>;
}

/// Final answer of [`SettingsResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Tracking may proceed.
    Satisfied,
    /// Tracking must not start.
    Unresolved(SettingsError),
    /// The attempt was stopped while the resolver was waiting.
    Abandoned,
}

/// Runs settings checks and resolutions.
#[derive(Clone)]
pub struct SettingsResolver {
    collaborator: Arc<dyn SettingsCollaborator>,
}

impl SettingsResolver {
    /// Create a resolver over the platform settings collaborator.
    pub fn new(collaborator: Arc<dyn SettingsCollaborator>) -> Self {
        Self { collaborator }
    }

    /// One settings-check round trip.
    pub async fn check(&self, request: &LocationRequest) -> SettingsOutcome {
        let outcome = self.collaborator.check_settings(request.clone()).await;
        tracing::debug!(
            accuracy = %request.accuracy,
            interval_ms = u64::try_from(request.interval.as_millis()).unwrap_or(u64::MAX),
            ?outcome,
            "Location settings checked"
        );
        outcome
    }

    /// Drive the settings to a final [`Resolution`].
    ///
    /// `liveness` is checked after every await so a stopped attempt never
    /// shows a resolution prompt.
    pub async fn resolve(&self, request: &LocationRequest, liveness: &Liveness) -> Resolution {
        let token = match self.check(request).await {
            SettingsOutcome::Satisfied => return Resolution::Satisfied,
            SettingsOutcome::Unresolvable(e) => return Resolution::Unresolved(e),
            SettingsOutcome::ResolutionRequired(token) => token,
        };

        if !liveness.is_alive() {
            return Resolution::Abandoned;
        }

        tracing::info!(resolution = %token, "Location settings need a change, presenting resolution");
        let accepted = self.collaborator.present_resolution(token).await;

        if !liveness.is_alive() {
            return Resolution::Abandoned;
        }
        if !accepted {
            tracing::info!("Settings resolution declined");
            return Resolution::Unresolved(SettingsError::ResolutionDeclined);
        }

        match self.check(request).await {
            SettingsOutcome::Satisfied => Resolution::Satisfied,
            SettingsOutcome::Unresolvable(e) => Resolution::Unresolved(e),
            SettingsOutcome::ResolutionRequired(_) => {
                Resolution::Unresolved(SettingsError::StillUnsatisfied)
            }
        }
    }
}
