//! Listener Registry.
//!
//! A single slot holding the consumer callback. Registering replaces the
//! previous listener; delivering with the slot empty is a no-op, not an error.

use std::sync::Arc;

use parking_lot::Mutex;

use super::error::TrackingError;
use super::sample::LocationSample;

/// Consumer of location samples.
///
/// Closures `Fn(&LocationSample)` implement this trait directly.
pub trait LocationListener: Send + Sync {
    /// A sample arrived from either delivery path.
    fn on_location(&self, sample: &LocationSample);

    /// Tracking ended without starting, or the subscription could not be opened.
    ///
    /// Only terminal errors are reported here.
    fn on_tracking_failed(&self, error: &TrackingError) {
        let _ = error;
    }
}

impl<F> LocationListener for F
where
    F: Fn(&LocationSample) + Send + Sync,
{
    fn on_location(&self, sample: &LocationSample) {
        self(sample)
    }
}

/// Single-slot listener registry.
#[derive(Default)]
pub struct ListenerRegistry {
    slot: Mutex<Option<Arc<dyn LocationListener>>>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a listener. Returns true if a previous listener was replaced.
    pub fn register(&self, listener: Arc<dyn LocationListener>) -> bool {
        self.slot.lock().replace(listener).is_some()
    }

    /// Remove the listener. Returns true if one was registered.
    pub fn unregister(&self) -> bool {
        self.slot.lock().take().is_some()
    }

    /// Whether a listener is registered.
    pub fn is_registered(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Hand a sample to the listener. Returns false if none is registered.
    ///
    /// The slot lock is released before the callback runs, so a listener may
    /// register or unregister from inside `on_location`.
    pub fn deliver(&self, sample: &LocationSample) -> bool {
        let listener = self.slot.lock().clone();
        match listener {
            Some(listener) => {
                listener.on_location(sample);
                true
            }
            None => false,
        }
    }

    /// Report a terminal error to the listener. Returns false if none is registered.
    pub fn notify_failure(&self, error: &TrackingError) -> bool {
        let listener = self.slot.lock().clone();
        match listener {
            Some(listener) => {
                listener.on_tracking_failed(error);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::{PositionFix, SampleSource};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample() -> LocationSample {
        LocationSample::from_fix(PositionFix::new(53.5, 10.0, 5.0), SampleSource::Push)
    }

    struct Counting {
        locations: AtomicUsize,
        failures: Mutex<Vec<TrackingError>>,
    }

    impl Counting {
        fn new() -> Self {
            Self {
                locations: AtomicUsize::new(0),
                failures: Mutex::new(Vec::new()),
            }
        }
    }

    impl LocationListener for Counting {
        fn on_location(&self, _sample: &LocationSample) {
            self.locations.fetch_add(1, Ordering::SeqCst);
        }

        fn on_tracking_failed(&self, error: &TrackingError) {
            self.failures.lock().push(error.clone());
        }
    }

    #[test]
    fn test_deliver_without_listener_is_noop() {
        let registry = ListenerRegistry::new();
        assert!(!registry.is_registered());
        assert!(!registry.deliver(&sample()));
        assert!(!registry.notify_failure(&TrackingError::PermissionDenied));
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = ListenerRegistry::new();
        let first = Arc::new(Counting::new());
        let second = Arc::new(Counting::new());

        assert!(!registry.register(first.clone()));
        assert!(registry.register(second.clone()));
        registry.deliver(&sample());

        assert_eq!(first.locations.load(Ordering::SeqCst), 0);
        assert_eq!(second.locations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = ListenerRegistry::new();
        let listener = Arc::new(Counting::new());
        registry.register(listener.clone());

        assert!(registry.unregister());
        assert!(!registry.unregister());
        assert!(!registry.deliver(&sample()));
        assert_eq!(listener.locations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failure_notification() {
        let registry = ListenerRegistry::new();
        let listener = Arc::new(Counting::new());
        registry.register(listener.clone());

        assert!(registry.notify_failure(&TrackingError::PermissionDenied));
        assert_eq!(
            listener.failures.lock().as_slice(),
            &[TrackingError::PermissionDenied]
        );
    }

    #[test]
    fn test_closure_listener() {
        let registry = ListenerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        registry.register(Arc::new(move |_: &LocationSample| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        registry.deliver(&sample());
        registry.deliver(&sample());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_can_unregister_itself() {
        let registry = Arc::new(ListenerRegistry::new());
        let handle = registry.clone();
        registry.register(Arc::new(move |_: &LocationSample| {
            handle.unregister();
        }));

        assert!(registry.deliver(&sample()));
        assert!(!registry.is_registered());
    }
}
