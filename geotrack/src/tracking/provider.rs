//! Location provider contract.
//!
//! The provider is the platform's location service. The tracker only needs
//! three things from it: a continuous subscription, a one-shot "last known
//! position" query, and a way to cancel the subscription.
//!
//! Push deliveries are value events ([`ProviderEvent`]) sent on a channel
//! rather than calls into a shared callback object. A single pump task on the
//! tracker side drains the channel, which keeps deliveries serialized and in
//! provider order.

use std::fmt;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use super::config::{AccuracyTier, Granularity, TrackingConfig};
use super::error::ProviderError;
use super::sample::PositionFix;

/// Opaque id of a provider-side subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    /// Wrap a provider-assigned id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The provider-assigned id.
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Conditions sent to both the settings check and the subscription.
///
/// Built only from a [`TrackingConfig`] so the settings that were checked are
/// exactly the settings the subscription asks for.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRequest {
    /// Desired update interval.
    pub interval: Duration,
    /// Minimum distance between updates in meters.
    pub min_distance_meters: f32,
    /// Requested accuracy tier.
    pub accuracy: AccuracyTier,
    /// Delay the first update until an accurate fix is available.
    pub wait_for_accurate_fix: bool,
    /// Granularity of delivered positions.
    pub granularity: Granularity,
}

impl From<&TrackingConfig> for LocationRequest {
    fn from(config: &TrackingConfig) -> Self {
        Self {
            interval: config.interval,
            min_distance_meters: config.min_distance_meters,
            accuracy: config.accuracy,
            wait_for_accurate_fix: config.wait_for_accurate_fix,
            granularity: config.granularity,
        }
    }
}

/// An event emitted by a push subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// Zero or more fixes collected since the previous delivery, oldest first.
    Locations(Vec<PositionFix>),
    /// The provider gained or lost the ability to produce fixes.
    Availability(bool),
    /// A single delivery failed; the subscription stays open.
    Failure(ProviderError),
}

/// Sending half handed to the provider with each subscription.
pub type ProviderEventSink = mpsc::UnboundedSender<ProviderEvent>;

/// The platform location service.
pub trait LocationProvider: Send + Sync {
    /// Open a continuous subscription that emits events on `sink`.
    fn request_updates(
        &self,
        request: &LocationRequest,
        sink: ProviderEventSink,
    ) -> Result<SubscriptionHandle, ProviderError>;

    /// Close a subscription. Unknown or already-removed handles are ignored.
    fn remove_updates(&self, handle: SubscriptionHandle);

    /// Most recent cached position, if the provider has one.
    fn last_known_position(&self) -> BoxFuture<'_, Result<Option<PositionFix>, ProviderError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_mirrors_config() {
        let config = TrackingConfig::new(Duration::from_secs(30))
            .with_min_distance(50.0)
            .with_accuracy(AccuracyTier::LowPower)
            .with_wait_for_accurate_fix(false)
            .with_granularity(Granularity::Fine);

        let request = LocationRequest::from(&config);

        assert_eq!(request.interval, Duration::from_secs(30));
        assert_eq!(request.min_distance_meters, 50.0);
        assert_eq!(request.accuracy, AccuracyTier::LowPower);
        assert!(!request.wait_for_accurate_fix);
        assert_eq!(request.granularity, Granularity::Fine);
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(SubscriptionHandle::new(7).to_string(), "sub-7");
        assert_eq!(SubscriptionHandle::new(7).id(), 7);
    }
}
