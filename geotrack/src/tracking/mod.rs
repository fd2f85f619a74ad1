//! Location tracking.
//!
//! This module turns a platform location service into a stream of
//! [`LocationSample`]s for a single consumer. Before any subscription is
//! opened the tracker makes sure the location permissions are held and the
//! device settings can satisfy the request, prompting through collaborators
//! when they are not.
//!
//! # Architecture
//!
//! ```text
//!                 LocationTracker (state machine)
//!                          │
//!       ┌──────────────────┼───────────────────┐
//!       ▼                  ▼                   ▼
//!  PermissionGate   SettingsResolver     delivery paths
//!                                        ├── UpdateSubscription (push)
//!                                        └── WatchdogPoller     (poll)
//!                                                   │
//!                                                   ▼
//!                                          ListenerRegistry ──► consumer
//! ```
//!
//! Both delivery paths run while tracking is active. Push carries the
//! provider's continuous updates; the watchdog asks for the last known
//! position once per interval so the consumer keeps hearing something when
//! push goes quiet. Samples are tagged with the path that produced them.
//!
//! # Platform seams
//!
//! Everything platform-specific sits behind three traits:
//!
//! - [`PermissionCollaborator`] - permission store and prompt
//! - [`SettingsCollaborator`] - settings check and resolution UI
//! - [`LocationProvider`] - subscription and last-known-position query

mod config;
mod error;
mod listener;
mod liveness;
mod permission;
mod provider;
mod sample;
mod settings;
mod state;
mod subscription;
mod tracker;
mod watchdog;

pub use config::{
    AccuracyTier, Granularity, ParseEnumError, TrackingConfig, DEFAULT_MIN_DISTANCE_METERS,
    DEFAULT_UPDATE_INTERVAL, MAX_UPDATE_INTERVAL,
};
pub use error::{ProviderError, SettingsError, TrackingError};
pub use listener::{ListenerRegistry, LocationListener};
pub use liveness::{Liveness, SampleSink};
pub use permission::{PermissionCollaborator, PermissionGate, PermissionKind, PermissionState};
pub use provider::{
    LocationProvider, LocationRequest, ProviderEvent, ProviderEventSink, SubscriptionHandle,
};
pub use sample::{LocationSample, PositionFix, SampleSource};
pub use settings::{
    Resolution, ResolutionToken, SettingsCollaborator, SettingsOutcome, SettingsResolver,
};
pub use state::TrackingState;
pub use subscription::UpdateSubscription;
pub use tracker::{LocationTracker, TrackerCollaborators};
pub use watchdog::WatchdogPoller;
