//! Tracker state.

use std::fmt;

/// Lifecycle state of a [`LocationTracker`](super::LocationTracker).
///
/// ```text
/// Idle --start--> PermissionPending --granted--> SettingsPending --satisfied--> Active
///                        |                             |
///                     denied                 declined/unresolvable
///                        v                             v
///                 PermissionDenied             SettingsUnresolved
///
/// any --stop--> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    /// Never started.
    #[default]
    Idle,
    /// Checking or waiting on location permissions.
    PermissionPending,
    /// Checking or resolving device settings.
    SettingsPending,
    /// Push subscription and watchdog are running.
    Active,
    /// Stopped by the consumer, or the subscription could not be opened.
    Stopped,
    /// The user declined location permission.
    PermissionDenied,
    /// Device settings cannot meet the request.
    SettingsUnresolved,
}

impl TrackingState {
    /// Samples are only delivered in this state.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Waiting on the permission or settings step.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PermissionPending | Self::SettingsPending)
    }

    /// Not tracking and not trying to.
    pub fn is_inactive(&self) -> bool {
        matches!(
            self,
            Self::Idle | Self::Stopped | Self::PermissionDenied | Self::SettingsUnresolved
        )
    }
}

impl fmt::Display for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "Idle",
            Self::PermissionPending => "PermissionPending",
            Self::SettingsPending => "SettingsPending",
            Self::Active => "Active",
            Self::Stopped => "Stopped",
            Self::PermissionDenied => "PermissionDenied",
            Self::SettingsUnresolved => "SettingsUnresolved",
        };
        f.write_str(label)
    }
}
