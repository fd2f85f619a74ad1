//! Simulated device movement.
//!
//! Feeds a [`SimulatedProvider`] with a random walk so `geotrack track` has
//! something to deliver. Each interval the device moves, the provider's
//! cached position follows it, and (unless push is stalled) a batch of fixes
//! goes out on the push path.

use std::f64::consts::TAU;
use std::sync::Arc;
use std::time::Duration;

use geotrack::simulation::SimulatedProvider;
use geotrack::tracking::PositionFix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

/// Meters per degree of latitude.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// A random walk over the globe.
pub struct RandomWalk {
    rng: StdRng,
    latitude: f64,
    longitude: f64,
    max_step_meters: f64,
}

impl RandomWalk {
    /// Start at the given coordinate. A seed makes the walk reproducible.
    pub fn new(latitude: f64, longitude: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            latitude: latitude.clamp(-90.0, 90.0),
            longitude: wrap_longitude(longitude),
            max_step_meters: 25.0,
        }
    }

    /// Maximum distance covered per step.
    pub fn with_max_step(mut self, meters: f64) -> Self {
        self.max_step_meters = meters.max(0.0);
        self
    }

    /// Move once and report where the device is.
    pub fn step(&mut self) -> PositionFix {
        let bearing = self.rng.random_range(0.0..TAU);
        let distance = self.rng.random_range(0.0..=self.max_step_meters);

        let d_lat = distance * bearing.cos() / METERS_PER_DEGREE;
        let lat_scale = self.latitude.to_radians().cos().max(1e-6);
        let d_lon = distance * bearing.sin() / (METERS_PER_DEGREE * lat_scale);

        self.latitude = (self.latitude + d_lat).clamp(-90.0, 90.0);
        self.longitude = wrap_longitude(self.longitude + d_lon);

        let accuracy = self.rng.random_range(3.0..15.0);
        PositionFix::new(self.latitude, self.longitude, accuracy)
    }

    /// `count` consecutive steps, oldest first.
    pub fn batch(&mut self, count: usize) -> Vec<PositionFix> {
        (0..count).map(|_| self.step()).collect()
    }
}

fn wrap_longitude(longitude: f64) -> f64 {
    (longitude + 180.0).rem_euclid(360.0) - 180.0
}

/// How the simulated device feeds the provider.
#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    /// Time between batches.
    pub interval: Duration,
    /// Fixes per push batch.
    pub batch: usize,
    /// Stop pushing after this many batches; the cached position keeps moving.
    pub stall_after: Option<u64>,
}

/// Move the device every interval until cancelled.
pub async fn run_driver(
    provider: Arc<SimulatedProvider>,
    mut walk: RandomWalk,
    config: DriverConfig,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.interval);
    let mut batches: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let fixes = walk.batch(config.batch.max(1));
        if let Some(last) = fixes.last() {
            provider.set_last_known(Some(*last));
        }

        batches += 1;
        match config.stall_after {
            Some(limit) if batches > limit => {
                if batches == limit + 1 {
                    tracing::info!(batches = limit, "Simulated push stalled, watchdog only from here");
                }
            }
            _ => provider.push(fixes),
        }
    }

    tracing::debug!(batches, "Simulated device stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use geotrack::tracking::{LocationProvider, LocationRequest, TrackingConfig};
    use proptest::prelude::*;

    /// Great-circle distance in meters (haversine).
    fn distance_meters(a: &PositionFix, b: &PositionFix) -> f64 {
        let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (b.longitude - a.longitude).to_radians();
        let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * 6_371_000.0 * h.sqrt().asin()
    }

    #[test]
    fn test_seeded_walk_is_reproducible() {
        let a: Vec<(f64, f64)> = RandomWalk::new(52.52, 13.405, Some(7))
            .batch(5)
            .iter()
            .map(|f| (f.latitude, f.longitude))
            .collect();
        let b: Vec<(f64, f64)> = RandomWalk::new(52.52, 13.405, Some(7))
            .batch(5)
            .iter()
            .map(|f| (f.latitude, f.longitude))
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_step_stays_put() {
        let mut walk = RandomWalk::new(10.0, 20.0, Some(1)).with_max_step(0.0);
        let fix = walk.step();
        assert_eq!((fix.latitude, fix.longitude), (10.0, 20.0));
    }

    #[test]
    fn test_wrap_longitude() {
        assert_eq!(wrap_longitude(190.0), -170.0);
        assert_eq!(wrap_longitude(-190.0), 170.0);
        assert_eq!(wrap_longitude(13.0), 13.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_stalls_push_but_keeps_cache_moving() {
        let provider = Arc::new(SimulatedProvider::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let request = LocationRequest::from(&TrackingConfig::default());
        provider.request_updates(&request, tx).unwrap();

        let cancel = CancellationToken::new();
        let driver = tokio::spawn(run_driver(
            provider.clone(),
            RandomWalk::new(0.0, 0.0, Some(3)),
            DriverConfig {
                interval: Duration::from_secs(1),
                batch: 2,
                stall_after: Some(2),
            },
            cancel.clone(),
        ));

        // Ticks at 0s, 1s, 2s, 3s.
        tokio::time::sleep(Duration::from_millis(3500)).await;
        cancel.cancel();
        driver.await.unwrap();

        let mut batches = 0;
        while rx.try_recv().is_ok() {
            batches += 1;
        }
        assert_eq!(batches, 2);
        assert!(provider.last_known_position().await.unwrap().is_some());
    }

    proptest! {
        #[test]
        fn prop_steps_stay_on_globe_and_bounded(
            lat in -89.0f64..89.0,
            lon in -180.0f64..180.0,
            seed in any::<u64>(),
        ) {
            let mut walk = RandomWalk::new(lat, lon, Some(seed));
            let mut previous = PositionFix::new(lat, lon, 0.0);
            for fix in walk.batch(20) {
                prop_assert!((-90.0..=90.0).contains(&fix.latitude));
                prop_assert!((-180.0..180.0).contains(&fix.longitude));
                prop_assert!((3.0..15.0).contains(&fix.accuracy_meters));
                prop_assert!(distance_meters(&previous, &fix) < 26.0);
                previous = fix;
            }
        }
    }
}
