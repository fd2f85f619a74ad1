//! Update Subscription - the push delivery path.
//!
//! Opens the provider subscription and runs the pump task that drains its
//! [`ProviderEvent`] channel. The pump forwards every fix of every batch, in
//! the order received, to the [`SampleSink`]. No reordering, no dedup.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use super::error::{ProviderError, TrackingError};
use super::liveness::{Liveness, SampleSink};
use super::provider::{LocationProvider, LocationRequest, ProviderEvent, SubscriptionHandle};
use super::sample::{LocationSample, SampleSource};

/// An open push subscription.
///
/// Stopping is idempotent; dropping stops.
pub struct UpdateSubscription {
    provider: Arc<dyn LocationProvider>,
    handle: Option<SubscriptionHandle>,
}

impl UpdateSubscription {
    /// Open the provider subscription and spawn its pump on `runtime`.
    ///
    /// Callers must already hold granted permissions and satisfied settings.
    pub fn start(
        provider: Arc<dyn LocationProvider>,
        request: &LocationRequest,
        liveness: Liveness,
        sink: Arc<dyn SampleSink>,
        runtime: &Handle,
    ) -> Result<Self, ProviderError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let handle = provider.request_updates(request, event_tx)?;

        tracing::info!(
            subscription = %handle,
            interval_ms = u64::try_from(request.interval.as_millis()).unwrap_or(u64::MAX),
            min_distance_m = request.min_distance_meters,
            accuracy = %request.accuracy,
            "Location updates requested"
        );

        runtime.spawn(run_pump(event_rx, liveness, sink, handle));

        Ok(Self {
            provider,
            handle: Some(handle),
        })
    }

    /// Release the provider subscription. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.provider.remove_updates(handle);
            tracing::info!(subscription = %handle, "Location updates removed");
        }
    }

    /// Whether the provider subscription is still held.
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Provider handle while active.
    pub fn handle(&self) -> Option<SubscriptionHandle> {
        self.handle
    }
}

impl Drop for UpdateSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Drain provider events until the attempt is revoked or the provider drops the sink.
async fn run_pump(
    mut events: mpsc::UnboundedReceiver<ProviderEvent>,
    liveness: Liveness,
    sink: Arc<dyn SampleSink>,
    handle: SubscriptionHandle,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = liveness.revoked() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => {
                    tracing::debug!(subscription = %handle, "Provider closed event channel");
                    break;
                }
            },
        };

        match event {
            ProviderEvent::Locations(fixes) => {
                tracing::trace!(subscription = %handle, count = fixes.len(), "Push batch received");
                for fix in fixes {
                    let sample = LocationSample::from_fix(fix, SampleSource::Push);
                    if let Err(e) = sink.deliver(sample, &liveness) {
                        tracing::trace!(subscription = %handle, error = %e, "Discarding push batch");
                        break;
                    }
                }
            }
            ProviderEvent::Availability(available) => {
                tracing::debug!(subscription = %handle, available, "Location availability changed");
            }
            ProviderEvent::Failure(e) => {
                let error = TrackingError::ProviderTransientFailure(e);
                tracing::warn!(subscription = %handle, error = %error, "Push delivery failed");
            }
        }
    }

    tracing::debug!(subscription = %handle, "Push pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::SimulatedProvider;
    use crate::tracking::{PositionFix, TrackingConfig};
    use parking_lot::Mutex;

    /// Records everything while the token is alive.
    #[derive(Default)]
    struct RecordingSink {
        samples: Mutex<Vec<LocationSample>>,
    }

    impl SampleSink for RecordingSink {
        fn deliver(&self, sample: LocationSample, liveness: &Liveness) -> Result<(), TrackingError> {
            if !liveness.is_alive() {
                return Err(TrackingError::TeardownRace);
            }
            self.samples.lock().push(sample);
            Ok(())
        }

        fn has_listener(&self) -> bool {
            true
        }
    }

    fn request() -> LocationRequest {
        LocationRequest::from(&TrackingConfig::default())
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_batch_forwarded_in_order() {
        let provider = Arc::new(SimulatedProvider::new());
        let sink = Arc::new(RecordingSink::default());
        let _subscription = UpdateSubscription::start(
            provider.clone(),
            &request(),
            Liveness::new(1),
            sink.clone(),
            &Handle::current(),
        )
        .unwrap();

        provider.push(vec![
            PositionFix::new(1.0, 1.0, 5.0),
            PositionFix::new(2.0, 2.0, 5.0),
            PositionFix::new(3.0, 3.0, 5.0),
        ]);
        provider.push(vec![]);
        provider.push(vec![PositionFix::new(4.0, 4.0, 5.0)]);
        settle().await;

        let latitudes: Vec<f64> = sink.samples.lock().iter().map(|s| s.latitude).collect();
        assert_eq!(latitudes, vec![1.0, 2.0, 3.0, 4.0]);
        assert!(sink
            .samples
            .lock()
            .iter()
            .all(|s| s.source == SampleSource::Push));
    }

    #[tokio::test]
    async fn test_duplicates_are_kept() {
        let provider = Arc::new(SimulatedProvider::new());
        let sink = Arc::new(RecordingSink::default());
        let _subscription = UpdateSubscription::start(
            provider.clone(),
            &request(),
            Liveness::new(1),
            sink.clone(),
            &Handle::current(),
        )
        .unwrap();

        let fix = PositionFix::new(1.0, 1.0, 5.0);
        provider.push(vec![fix, fix]);
        settle().await;

        assert_eq!(sink.samples.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let provider = Arc::new(SimulatedProvider::new());
        let mut subscription = UpdateSubscription::start(
            provider.clone(),
            &request(),
            Liveness::new(1),
            Arc::new(RecordingSink::default()),
            &Handle::current(),
        )
        .unwrap();
        assert_eq!(provider.active_subscriptions(), 1);

        subscription.stop();
        subscription.stop();
        drop(subscription);

        assert_eq!(provider.active_subscriptions(), 0);
        assert_eq!(provider.removed_count(), 1);
    }

    #[tokio::test]
    async fn test_revoked_liveness_discards_late_batch() {
        let provider = Arc::new(SimulatedProvider::new());
        let sink = Arc::new(RecordingSink::default());
        let liveness = Liveness::new(1);
        let _subscription = UpdateSubscription::start(
            provider.clone(),
            &request(),
            liveness.clone(),
            sink.clone(),
            &Handle::current(),
        )
        .unwrap();
        let late_sink = provider.last_sink().unwrap();

        liveness.revoke();
        let _ = late_sink.send(ProviderEvent::Locations(vec![PositionFix::new(1.0, 1.0, 5.0)]));
        settle().await;

        assert!(sink.samples.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failures_do_not_end_subscription() {
        let provider = Arc::new(SimulatedProvider::new());
        let sink = Arc::new(RecordingSink::default());
        let _subscription = UpdateSubscription::start(
            provider.clone(),
            &request(),
            Liveness::new(1),
            sink.clone(),
            &Handle::current(),
        )
        .unwrap();
        let events = provider.last_sink().unwrap();

        events
            .send(ProviderEvent::Failure(ProviderError::RequestFailed(
                "throttled".to_string(),
            )))
            .unwrap();
        events.send(ProviderEvent::Availability(false)).unwrap();
        provider.push(vec![PositionFix::new(1.0, 1.0, 5.0)]);
        settle().await;

        assert_eq!(sink.samples.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_request_failure_propagates() {
        let provider = Arc::new(SimulatedProvider::new());
        provider.fail_next_request(ProviderError::PermissionMissing);

        let result = UpdateSubscription::start(
            provider.clone(),
            &request(),
            Liveness::new(1),
            Arc::new(RecordingSink::default()),
            &Handle::current(),
        );

        assert!(matches!(result, Err(ProviderError::PermissionMissing)));
        assert_eq!(provider.active_subscriptions(), 0);
    }
}
