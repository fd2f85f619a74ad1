//! Location tracker - the acquisition state machine.
//!
//! [`LocationTracker`] sequences the Permission Gate, the Settings Resolver
//! and the two delivery paths, and owns the single listener slot.
//!
//! # Serialization
//!
//! All tracker state lives in one [`Session`] behind a reentrant mutex.
//! Callbacks arrive from tokio tasks, provider threads and the consumer; each
//! takes the lock, checks its [`Liveness`] token, and only then mutates. The
//! lock is never held across an `.await`: a step snapshots what it needs,
//! releases the lock, awaits the collaborator, and re-acquires.
//!
//! Samples are handed to the listener while the lock is held. A `stop()` on
//! another thread therefore waits for an in-progress delivery, and once it
//! returns no further sample can reach the listener. The mutex is reentrant
//! so a listener may call `stop()` or `start()` from inside its callback.
//!
//! # Restart on grant
//!
//! When the permission prompt comes back granted, the tracker runs the whole
//! start sequence again instead of resuming at the settings step. Device
//! settings may have changed while the prompt was up. The rerun is marked
//! so that a collaborator still reporting "not granted" ends the attempt as
//! denied rather than prompting a second time.

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tokio::runtime::Handle;
use tokio::sync::watch;

use super::config::TrackingConfig;
use super::error::TrackingError;
use super::listener::{ListenerRegistry, LocationListener};
use super::liveness::{Liveness, SampleSink};
use super::permission::{PermissionCollaborator, PermissionGate, PermissionState};
use super::provider::{LocationProvider, LocationRequest};
use super::sample::LocationSample;
use super::settings::{Resolution, SettingsCollaborator, SettingsResolver};
use super::state::TrackingState;
use super::subscription::UpdateSubscription;
use super::watchdog::WatchdogPoller;

/// The platform services a tracker talks to.
#[derive(Clone)]
pub struct TrackerCollaborators {
    /// Permission store and prompt.
    pub permissions: Arc<dyn PermissionCollaborator>,
    /// Settings client and resolution UI.
    pub settings: Arc<dyn SettingsCollaborator>,
    /// Location provider.
    pub provider: Arc<dyn LocationProvider>,
}

/// Mutable state of the current attempt.
#[derive(Default)]
struct Session {
    state: TrackingState,
    generation: u64,
    liveness: Option<Liveness>,
    subscription: Option<UpdateSubscription>,
    watchdog: Option<WatchdogPoller>,
}

impl Session {
    /// Whether `liveness` belongs to the current, unrevoked attempt.
    fn owns(&self, liveness: &Liveness) -> bool {
        liveness.is_alive() && liveness.generation() == self.generation
    }

    /// Tear down whatever exists and issue a token for a new attempt.
    fn begin_attempt(&mut self) -> Liveness {
        self.teardown();
        self.generation += 1;
        let liveness = Liveness::new(self.generation);
        self.liveness = Some(liveness.clone());
        liveness
    }

    /// Revoke the current token and release both delivery paths.
    fn teardown(&mut self) {
        if let Some(liveness) = self.liveness.take() {
            liveness.revoke();
        }
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.stop();
        }
        if let Some(mut subscription) = self.subscription.take() {
            subscription.stop();
        }
    }
}

struct TrackerInner {
    config: TrackingConfig,
    request: LocationRequest,
    gate: PermissionGate,
    resolver: SettingsResolver,
    provider: Arc<dyn LocationProvider>,
    listeners: ListenerRegistry,
    session: ReentrantMutex<RefCell<Session>>,
    state_tx: watch::Sender<TrackingState>,
    runtime: Handle,
}

impl TrackerInner {
    fn set_state(&self, session: &mut Session, state: TrackingState) {
        if session.state != state {
            tracing::debug!(
                from = %session.state,
                to = %state,
                generation = session.generation,
                "Tracking state changed"
            );
            session.state = state;
            self.state_tx.send_replace(state);
        }
    }

    /// Begin a new attempt.
    ///
    /// `expected` is the attempt whose permission prompt was just granted; a
    /// restart is only honoured if that attempt is still current.
    fn begin(self: &Arc<Self>, expected: Option<&Liveness>, after_grant: bool) {
        let guard = self.session.lock();
        let mut session = guard.borrow_mut();

        match expected {
            Some(liveness) if !session.owns(liveness) => {
                tracing::trace!(
                    error = %TrackingError::TeardownRace,
                    "Ignoring permission result for a stopped attempt"
                );
                return;
            }
            Some(_) => {}
            None if session.state.is_active() => {
                tracing::debug!("Location tracking already active, start ignored");
                return;
            }
            None if session.state.is_pending() => {
                tracing::info!(state = %session.state, "Restarting location tracking from the top");
            }
            None => {}
        }

        let liveness = session.begin_attempt();
        self.set_state(&mut session, TrackingState::PermissionPending);
        tracing::info!(
            generation = liveness.generation(),
            after_grant,
            "Starting location tracking"
        );
        drop(session);
        drop(guard);

        let inner = Arc::clone(self);
        self.runtime
            .spawn(async move { inner.run_attempt(liveness, after_grant).await });
    }

    async fn run_attempt(self: Arc<Self>, liveness: Liveness, after_grant: bool) {
        match self.gate.check() {
            PermissionState::Granted => {}
            state if after_grant => {
                tracing::warn!(?state, "Location permission still missing after grant");
                self.fail(
                    &liveness,
                    TrackingState::PermissionDenied,
                    TrackingError::PermissionDenied,
                );
                return;
            }
            state => {
                tracing::debug!(?state, "Location permission missing");
                let granted = self.gate.request().await;
                self.on_permission_result(&liveness, granted);
                return;
            }
        }

        if !self.advance(
            &liveness,
            TrackingState::PermissionPending,
            TrackingState::SettingsPending,
        ) {
            return;
        }

        match self.resolver.resolve(&self.request, &liveness).await {
            Resolution::Satisfied => self.activate(&liveness),
            Resolution::Unresolved(e) => self.fail(
                &liveness,
                TrackingState::SettingsUnresolved,
                TrackingError::SettingsUnresolvable(e),
            ),
            Resolution::Abandoned => {
                tracing::trace!(
                    generation = liveness.generation(),
                    "Settings resolution abandoned by stop"
                );
            }
        }
    }

    fn on_permission_result(self: &Arc<Self>, liveness: &Liveness, granted: bool) {
        if granted {
            self.begin(Some(liveness), true);
        } else {
            self.fail(
                liveness,
                TrackingState::PermissionDenied,
                TrackingError::PermissionDenied,
            );
        }
    }

    /// Move `from` -> `to` if the attempt is still current.
    fn advance(&self, liveness: &Liveness, from: TrackingState, to: TrackingState) -> bool {
        let guard = self.session.lock();
        let mut session = guard.borrow_mut();
        if !session.owns(liveness) || session.state != from {
            tracing::trace!(error = %TrackingError::TeardownRace, %from, %to, "Transition discarded");
            return false;
        }
        self.set_state(&mut session, to);
        true
    }

    /// End the attempt in a terminal state and tell the listener.
    fn fail(&self, liveness: &Liveness, state: TrackingState, error: TrackingError) {
        let guard = self.session.lock();
        {
            let mut session = guard.borrow_mut();
            if !session.owns(liveness) {
                tracing::trace!(error = %error, "Discarding failure of a stopped attempt");
                return;
            }
            session.teardown();
            self.set_state(&mut session, state);
        }
        tracing::warn!(error = %error, state = %state, "Location tracking did not start");
        self.listeners.notify_failure(&error);
    }

    /// Open both delivery paths.
    fn activate(self: &Arc<Self>, liveness: &Liveness) {
        let guard = self.session.lock();
        let mut session = guard.borrow_mut();
        if !session.owns(liveness) || session.state != TrackingState::SettingsPending {
            tracing::trace!(error = %TrackingError::TeardownRace, "Activation discarded");
            return;
        }

        let sink: Arc<dyn SampleSink> = self.clone();
        let subscription = UpdateSubscription::start(
            Arc::clone(&self.provider),
            &self.request,
            liveness.clone(),
            Arc::clone(&sink),
            &self.runtime,
        );

        match subscription {
            Ok(subscription) => {
                let watchdog = WatchdogPoller::start(
                    Arc::clone(&self.provider),
                    self.config.interval,
                    liveness.clone(),
                    sink,
                    &self.runtime,
                );
                session.subscription = Some(subscription);
                session.watchdog = Some(watchdog);
                self.set_state(&mut session, TrackingState::Active);
                tracing::info!(
                    generation = liveness.generation(),
                    interval_ms = u64::try_from(self.config.interval.as_millis()).unwrap_or(u64::MAX),
                    "Location tracking active"
                );
            }
            Err(e) => {
                let error = TrackingError::SubscriptionFailed(e);
                session.teardown();
                self.set_state(&mut session, TrackingState::Stopped);
                drop(session);
                tracing::warn!(error = %error, "Location tracking did not start");
                self.listeners.notify_failure(&error);
            }
        }
    }

    fn stop(&self) {
        let guard = self.session.lock();
        let mut session = guard.borrow_mut();
        let previous = session.state;
        session.teardown();
        self.set_state(&mut session, TrackingState::Stopped);
        tracing::info!(previous = %previous, "Location tracking stopped");
    }
}

impl SampleSink for TrackerInner {
    fn deliver(&self, sample: LocationSample, liveness: &Liveness) -> Result<(), TrackingError> {
        let guard = self.session.lock();
        {
            let session = guard.borrow();
            if !session.owns(liveness) || !session.state.is_active() {
                return Err(TrackingError::TeardownRace);
            }
        }
        if !self.listeners.deliver(&sample) {
            tracing::trace!(source = %sample.source, "No listener registered, sample dropped");
        }
        drop(guard);
        Ok(())
    }

    fn has_listener(&self) -> bool {
        self.listeners.is_registered()
    }
}

/// Location acquisition state machine.
///
/// `start()` and `stop()` return immediately; the permission, settings and
/// delivery work runs on the tokio runtime the tracker was built on.
/// Dropping the tracker stops it.
///
/// # Example
///
/// ```ignore
/// let tracker = LocationTracker::new(TrackingConfig::default(), collaborators)?;
/// tracker.register(|sample: &LocationSample| {
///     println!("{} {:?}", sample.source, sample.position());
/// });
/// tracker.start();
///
/// let mut state = tracker.subscribe_state();
/// state.wait_for(|s| !s.is_pending()).await?;
/// ```
pub struct LocationTracker {
    inner: Arc<TrackerInner>,
}

impl LocationTracker {
    /// Create a tracker on the current tokio runtime.
    pub fn new(
        config: TrackingConfig,
        collaborators: TrackerCollaborators,
    ) -> Result<Self, TrackingError> {
        let runtime = Handle::try_current().map_err(|_| TrackingError::NoRuntime)?;
        Self::with_runtime(config, collaborators, runtime)
    }

    /// Create a tracker that runs its work on `runtime`.
    pub fn with_runtime(
        config: TrackingConfig,
        collaborators: TrackerCollaborators,
        runtime: Handle,
    ) -> Result<Self, TrackingError> {
        config.validate()?;

        let request = LocationRequest::from(&config);
        let (state_tx, _) = watch::channel(TrackingState::Idle);

        Ok(Self {
            inner: Arc::new(TrackerInner {
                config,
                request,
                gate: PermissionGate::new(collaborators.permissions),
                resolver: SettingsResolver::new(collaborators.settings),
                provider: collaborators.provider,
                listeners: ListenerRegistry::new(),
                session: ReentrantMutex::new(RefCell::new(Session::default())),
                state_tx,
                runtime,
            }),
        })
    }

    /// Install the listener, replacing any previous one.
    pub fn register<L>(&self, listener: L)
    where
        L: LocationListener + 'static,
    {
        if self.inner.listeners.register(Arc::new(listener)) {
            tracing::debug!("Replaced location listener");
        }
    }

    /// Remove the listener. Later samples are dropped.
    pub fn unregister(&self) {
        self.inner.listeners.unregister();
    }

    /// Start tracking.
    ///
    /// No-op while active. While waiting on permissions or settings the
    /// sequence restarts from the top. From any inactive state a new attempt
    /// begins.
    pub fn start(&self) {
        self.inner.begin(None, false);
    }

    /// Stop tracking and tear down both delivery paths. Always safe to call.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Current state.
    pub fn state(&self) -> TrackingState {
        *self.inner.state_tx.borrow()
    }

    /// Watch state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<TrackingState> {
        self.inner.state_tx.subscribe()
    }

    /// The configuration this tracker was built with.
    pub fn config(&self) -> &TrackingConfig {
        &self.inner.config
    }

    /// (subscription active, watchdog period) of the current session.
    #[cfg(test)]
    fn delivery_paths(&self) -> (bool, Option<std::time::Duration>) {
        let guard = self.inner.session.lock();
        let session = guard.borrow();
        let subscribed = session
            .subscription
            .as_ref()
            .is_some_and(UpdateSubscription::is_active);
        let period = session
            .watchdog
            .as_ref()
            .filter(|w| w.is_running())
            .map(WatchdogPoller::period);
        (subscribed, period)
    }
}

impl Drop for LocationTracker {
    fn drop(&mut self) {
        if !self.state().is_inactive() {
            self.inner.stop();
        }
    }
}
