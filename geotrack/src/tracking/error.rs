//! Error types for location tracking.

use thiserror::Error;

/// Errors reported by the location provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider service is not reachable.
    #[error("Location provider unavailable: {0}")]
    Unavailable(String),

    /// A request to the provider failed.
    #[error("Provider request failed: {0}")]
    RequestFailed(String),

    /// The platform refused the request for lack of permission.
    #[error("Location permission missing at provider")]
    PermissionMissing,
}

/// Reasons device settings could not be brought in line with the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// The settings check itself failed.
    #[error("Settings check failed: {0}")]
    CheckFailed(String),

    /// The device cannot satisfy the request and offers no way to change that.
    #[error("Location settings cannot be changed on this device")]
    ChangeUnavailable,

    /// The user declined (or the UI failed to show) the resolution prompt.
    #[error("Settings resolution declined")]
    ResolutionDeclined,

    /// Settings were still unsatisfied after an accepted resolution.
    #[error("Settings still unsatisfied after resolution")]
    StillUnsatisfied,
}

/// Tracking errors.
///
/// Only terminal errors ([`TrackingError::is_terminal`]) reach the listener;
/// the rest are absorbed and logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackingError {
    /// The user declined location permission.
    #[error("Location permission denied")]
    PermissionDenied,

    /// Device settings cannot meet the requested accuracy.
    #[error("Location settings unresolvable: {0}")]
    SettingsUnresolvable(#[source] SettingsError),

    /// The provider refused the push subscription.
    #[error("Failed to start location updates: {0}")]
    SubscriptionFailed(#[source] ProviderError),

    /// A single poll or push delivery failed.
    #[error("Transient provider failure: {0}")]
    ProviderTransientFailure(#[source] ProviderError),

    /// A callback arrived for a session that has since stopped.
    #[error("Callback arrived after tracking stopped")]
    TeardownRace,

    /// The tracking configuration cannot drive a session.
    #[error("Invalid tracking configuration: {0}")]
    InvalidConfig(String),

    /// No tokio runtime to run callbacks on.
    #[error("No tokio runtime available")]
    NoRuntime,
}

impl TrackingError {
    /// Returns true for errors that end a session and are surfaced to the listener.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied | Self::SettingsUnresolvable(_) | Self::SubscriptionFailed(_)
        )
    }
}

impl From<SettingsError> for TrackingError {
    fn from(e: SettingsError) -> Self {
        TrackingError::SettingsUnresolvable(e)
    }
}
