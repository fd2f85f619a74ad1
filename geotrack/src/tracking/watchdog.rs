//! Watchdog Poller - the poll delivery path.
//!
//! The push subscription can go quiet without reporting an error (provider
//! throttling, OS suspending the app). The watchdog puts a floor under
//! update freshness: every interval it asks the provider for its last known
//! position and forwards whatever comes back, tagged [`SampleSource::Poll`].
//!
//! It runs alongside the push path for as long as tracking is active, and
//! fires on the configured interval whether or not push is healthy.
//!
//! # Tick rules
//!
//! - First tick one full interval after start
//! - No registered listener: skip without querying the provider
//! - Provider error or no cached position: skip silently, keep ticking
//! - A poll in flight when the watchdog stops completes, but the sink
//!   rejects its result because the liveness token is revoked

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::config::MAX_UPDATE_INTERVAL;
use super::error::TrackingError;
use super::liveness::{Liveness, SampleSink};
use super::provider::LocationProvider;
use super::sample::{LocationSample, SampleSource};

/// The repeating poll timer.
pub struct WatchdogPoller {
    period: Duration,
    timer: CancellationToken,
}

impl WatchdogPoller {
    /// Spawn the poll loop on `runtime`.
    ///
    /// The timer is also cancelled when `liveness` is revoked.
    pub fn start(
        provider: Arc<dyn LocationProvider>,
        period: Duration,
        liveness: Liveness,
        sink: Arc<dyn SampleSink>,
        runtime: &Handle,
    ) -> Self {
        let timer = liveness.child_token();
        tracing::info!(
            period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            "Watchdog poller started"
        );

        runtime.spawn(run_poll_loop(provider, period, liveness, sink, timer.clone()));

        Self { period, timer }
    }

    /// Cancel future ticks.
    pub fn stop(&self) {
        if !self.timer.is_cancelled() {
            self.timer.cancel();
            tracing::info!("Watchdog poller stopped");
        }
    }

    /// Whether future ticks are still scheduled.
    pub fn is_running(&self) -> bool {
        !self.timer.is_cancelled()
    }

    /// Poll period.
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for WatchdogPoller {
    fn drop(&mut self) {
        self.timer.cancel();
    }
}

async fn run_poll_loop(
    provider: Arc<dyn LocationProvider>,
    period: Duration,
    liveness: Liveness,
    sink: Arc<dyn SampleSink>,
    timer: CancellationToken,
) {
    // Timer arithmetic must not overflow `Instant`.
    let period = if period > MAX_UPDATE_INTERVAL {
        tracing::warn!(?period, "Watchdog period out of range, clamping to one day");
        MAX_UPDATE_INTERVAL
    } else {
        period
    };
    let now = Instant::now();
    let first = now.checked_add(period).unwrap_or(now);
    let mut ticker = tokio::time::interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = timer.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !sink.has_listener() {
            tracing::trace!("No listener registered, skipping watchdog poll");
            continue;
        }

        match provider.last_known_position().await {
            Ok(Some(fix)) => {
                let sample = LocationSample::from_fix(fix, SampleSource::Poll);
                if let Err(e) = sink.deliver(sample, &liveness) {
                    tracing::trace!(error = %e, "Discarding watchdog poll result");
                }
            }
            Ok(None) => {
                tracing::trace!("No cached position, skipping watchdog tick");
            }
            Err(e) => {
                let error = TrackingError::ProviderTransientFailure(e);
                tracing::debug!(error = %error, "Watchdog poll failed, skipping tick");
            }
        }
    }

    tracing::debug!("Watchdog poll loop exited");
}
