//! In-memory collaborators.
//!
//! Scriptable stand-ins for the three platform seams. They back the test
//! suite and the `geotrack track` demo, where no real location service is
//! available.
//!
//! Every collaborator can optionally be gated on a [`Notify`]: the gated
//! call records itself, then parks until the test releases it. This is how
//! tests hold a prompt or a poll "in flight" while they stop the tracker.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::tracking::{
    LocationProvider, LocationRequest, PermissionCollaborator, PermissionKind, PermissionState,
    PositionFix, ProviderError, ProviderEvent, ProviderEventSink, ResolutionToken,
    SettingsCollaborator, SettingsOutcome, SubscriptionHandle,
};

// =============================================================================
// Permissions
// =============================================================================

/// Permission store with a scripted prompt.
pub struct ScriptedPermissions {
    states: Mutex<HashMap<PermissionKind, PermissionState>>,
    grant_on_request: bool,
    sticky: bool,
    requests: AtomicUsize,
    request_gate: Option<Arc<Notify>>,
}

impl ScriptedPermissions {
    fn with_all(state: PermissionState) -> Self {
        let states = PermissionKind::REQUIRED
            .iter()
            .map(|kind| (*kind, state))
            .collect();
        Self {
            states: Mutex::new(states),
            grant_on_request: true,
            sticky: false,
            requests: AtomicUsize::new(0),
            request_gate: None,
        }
    }

    /// Every permission already granted.
    pub fn granted() -> Self {
        Self::with_all(PermissionState::Granted)
    }

    /// Never asked. The prompt grants unless told otherwise.
    pub fn unknown() -> Self {
        Self::with_all(PermissionState::Unknown)
    }

    /// Every permission refused.
    pub fn denied() -> Self {
        Self::with_all(PermissionState::Denied).grant_on_request(false)
    }

    /// What the prompt answers.
    pub fn grant_on_request(mut self, grant: bool) -> Self {
        self.grant_on_request = grant;
        self
    }

    /// The prompt answers but does not update the store.
    pub fn sticky(mut self) -> Self {
        self.sticky = true;
        self
    }

    /// Park each prompt until `gate` is notified.
    pub fn with_request_gate(mut self, gate: Arc<Notify>) -> Self {
        self.request_gate = Some(gate);
        self
    }

    /// Overwrite a single permission.
    pub fn set(&self, kind: PermissionKind, state: PermissionState) {
        self.states.lock().insert(kind, state);
    }

    /// Number of prompts issued.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PermissionCollaborator for ScriptedPermissions {
    fn check_permission(&self, kind: PermissionKind) -> PermissionState {
        self.states.lock().get(&kind).copied().unwrap_or_default()
    }

    fn request_permissions(&self, kinds: &[PermissionKind]) -> BoxFuture<'_, bool> {
        let kinds = kinds.to_vec();
        async move {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.request_gate {
                gate.notified().await;
            }

            let granted = self.grant_on_request;
            if !self.sticky {
                let answer = if granted {
                    PermissionState::Granted
                } else {
                    PermissionState::Denied
                };
                let mut states = self.states.lock();
                for kind in kinds {
                    states.insert(kind, answer);
                }
            }
            granted
        }
        .boxed()
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Settings client that replays queued outcomes.
///
/// Checks pop the queue front; an empty queue answers
/// [`SettingsOutcome::Satisfied`].
pub struct ScriptedSettings {
    outcomes: Mutex<VecDeque<SettingsOutcome>>,
    accept_resolution: bool,
    checks: AtomicUsize,
    resolutions: AtomicUsize,
    last_request: Mutex<Option<LocationRequest>>,
    resolution_gate: Option<Arc<Notify>>,
}

impl ScriptedSettings {
    /// Settings that are satisfied on every check.
    pub fn satisfied() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            accept_resolution: true,
            checks: AtomicUsize::new(0),
            resolutions: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            resolution_gate: None,
        }
    }

    /// Queue the outcome of the next unscripted check.
    pub fn then(self, outcome: SettingsOutcome) -> Self {
        self.outcomes.lock().push_back(outcome);
        self
    }

    /// What the user answers to a resolution prompt.
    pub fn accept_resolution(mut self, accept: bool) -> Self {
        self.accept_resolution = accept;
        self
    }

    /// Park each resolution prompt until `gate` is notified.
    pub fn with_resolution_gate(mut self, gate: Arc<Notify>) -> Self {
        self.resolution_gate = Some(gate);
        self
    }

    /// Number of settings checks.
    pub fn check_count(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    /// Number of resolution prompts shown.
    pub fn resolution_count(&self) -> usize {
        self.resolutions.load(Ordering::SeqCst)
    }

    /// The request seen by the most recent check.
    pub fn last_request(&self) -> Option<LocationRequest> {
        self.last_request.lock().clone()
    }
}

impl SettingsCollaborator for ScriptedSettings {
    fn check_settings(&self, request: LocationRequest) -> BoxFuture<'_, SettingsOutcome> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request);
        let outcome = self
            .outcomes
            .lock()
            .pop_front()
            .unwrap_or(SettingsOutcome::Satisfied);
        futures::future::ready(outcome).boxed()
    }

    fn present_resolution(&self, _token: ResolutionToken) -> BoxFuture<'_, bool> {
        async move {
            self.resolutions.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.resolution_gate {
                gate.notified().await;
            }
            self.accept_resolution
        }
        .boxed()
    }
}

// =============================================================================
// Provider
// =============================================================================

#[derive(Default)]
struct ProviderState {
    next_id: u64,
    subscriptions: Vec<(SubscriptionHandle, ProviderEventSink)>,
    requests: Vec<LocationRequest>,
    removed: usize,
    fail_next_request: Option<ProviderError>,
    last_sink: Option<ProviderEventSink>,
    last_known: Option<PositionFix>,
    poll_results: VecDeque<Result<Option<PositionFix>, ProviderError>>,
}

/// Location provider driven by hand.
///
/// [`push`](Self::push) emits a batch to every open subscription. Polls
/// answer from the queued results first, then from the cached position set
/// with [`set_last_known`](Self::set_last_known). Pushing does not update
/// that cache.
#[derive(Default)]
pub struct SimulatedProvider {
    state: Mutex<ProviderState>,
    polls: AtomicUsize,
    poll_gate: Option<Arc<Notify>>,
}

impl SimulatedProvider {
    /// Provider with no subscriptions and no cached position.
    pub fn new() -> Self {
        Self::default()
    }

    /// Park each poll until `gate` is notified.
    pub fn with_poll_gate(mut self, gate: Arc<Notify>) -> Self {
        self.poll_gate = Some(gate);
        self
    }

    /// Emit a batch of fixes to every open subscription.
    pub fn push(&self, fixes: Vec<PositionFix>) {
        self.emit(ProviderEvent::Locations(fixes));
    }

    /// Emit an arbitrary event to every open subscription.
    pub fn emit(&self, event: ProviderEvent) {
        let sinks: Vec<ProviderEventSink> = self
            .state
            .lock()
            .subscriptions
            .iter()
            .map(|(_, sink)| sink.clone())
            .collect();
        for sink in sinks {
            let _ = sink.send(event.clone());
        }
    }

    /// Set the cached position returned by polls.
    pub fn set_last_known(&self, fix: Option<PositionFix>) {
        self.state.lock().last_known = fix;
    }

    /// Queue the answer of the next poll.
    pub fn queue_poll_result(&self, result: Result<Option<PositionFix>, ProviderError>) {
        self.state.lock().poll_results.push_back(result);
    }

    /// Make the next `request_updates` fail.
    pub fn fail_next_request(&self, error: ProviderError) {
        self.state.lock().fail_next_request = Some(error);
    }

    /// Number of open subscriptions.
    pub fn active_subscriptions(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    /// Number of subscriptions removed.
    pub fn removed_count(&self) -> usize {
        self.state.lock().removed
    }

    /// Number of successful subscription requests.
    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Every successful subscription request, oldest first.
    pub fn requests(&self) -> Vec<LocationRequest> {
        self.state.lock().requests.clone()
    }

    /// Number of last-known-position queries.
    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    /// The sink of the most recent subscription, kept even after removal.
    ///
    /// Lets tests deliver a batch "late", after the subscription is gone.
    pub fn last_sink(&self) -> Option<ProviderEventSink> {
        self.state.lock().last_sink.clone()
    }
}

impl LocationProvider for SimulatedProvider {
    fn request_updates(
        &self,
        request: &LocationRequest,
        sink: ProviderEventSink,
    ) -> Result<SubscriptionHandle, ProviderError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_next_request.take() {
            return Err(error);
        }

        state.next_id += 1;
        let handle = SubscriptionHandle::new(state.next_id);
        state.requests.push(request.clone());
        state.last_sink = Some(sink.clone());
        state.subscriptions.push((handle, sink));
        Ok(handle)
    }

    fn remove_updates(&self, handle: SubscriptionHandle) {
        let mut state = self.state.lock();
        let before = state.subscriptions.len();
        state.subscriptions.retain(|(h, _)| *h != handle);
        if state.subscriptions.len() < before {
            state.removed += 1;
        }
    }

    fn last_known_position(&self) -> BoxFuture<'_, Result<Option<PositionFix>, ProviderError>> {
        async move {
            self.polls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.poll_gate {
                gate.notified().await;
            }

            let mut state = self.state.lock();
            match state.poll_results.pop_front() {
                Some(result) => result,
                None => Ok(state.last_known),
            }
        }
        .boxed()
    }
}
