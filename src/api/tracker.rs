//! Proximity tracker state machine
//!
//! A [`ProximityTracker`] turns a stream of position samples into a stream of
//! [`ProximityState`]s for one target. Each accepted sample recomputes the
//! distance, runs the raw classification through hysteresis, refreshes the
//! staleness clock and publishes the new state to every subscriber.
//!
//! Published states and events are queued in a FIFO outbox and drained by a
//! single flusher with no lock held, so a subscriber may call back into the
//! tracker (including [`stop`](ProximityTracker::stop)) and deliveries never
//! interleave.

use crate::algorithms::{classify, haversine_distance, DistanceError};
use crate::api::types::{
    RejectReason, SampleOutcome, StopReason, TrackerError, TrackerEvent, TrackerPhase,
    TrackerResult,
};
use crate::core::{PositionSample, ProximityState, Staleness, TargetLocation};
use crate::processing::{HysteresisFilter, StalenessMonitor};
use crate::source::LocationError;
use crate::utils::config::TrackerConfig;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Callback invoked with every published state
pub type StateCallback = Arc<dyn Fn(&ProximityState) + Send + Sync>;

/// Callback invoked with every tracker event
pub type EventCallback = Arc<dyn Fn(&TrackerEvent) + Send + Sync>;

/// Identifies one registered callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Returned by `subscribe`; call [`unsubscribe`](Subscription::unsubscribe) to stop receiving.
///
/// Dropping a `Subscription` does not unsubscribe.
#[derive(Debug)]
pub struct Subscription {
    handle: SubscriptionHandle,
    shared: Weak<Shared>,
}

impl Subscription {
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }

    /// Remove the callback. Returns false if it was already removed or the
    /// tracker is gone.
    pub fn unsubscribe(self) -> bool {
        match self.shared.upgrade() {
            Some(shared) => shared.subscribers.lock().remove(self.handle),
            None => false,
        }
    }
}

/// Counters describing what a tracker did with its input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub accepted_samples: u64,
    pub rejected_samples: u64,
    pub published_states: u64,
    pub source_errors: u64,
}

enum Outgoing {
    State(ProximityState),
    Event(TrackerEvent),
}

struct TrackerCore {
    phase: TrackerPhase,
    state: ProximityState,
    hysteresis: HysteresisFilter,
    staleness: StalenessMonitor,
    last_accepted_ms: Option<u64>,
    last_error: Option<LocationError>,
    stop_reason: Option<StopReason>,
    stats: TrackerStats,
    outbox: VecDeque<Outgoing>,
}

impl TrackerCore {
    fn publish(&mut self) {
        self.stats.published_states += 1;
        self.outbox.push_back(Outgoing::State(self.state));
    }

    fn set_phase(&mut self, to: TrackerPhase) {
        let from = self.phase;
        if from == to {
            return;
        }
        self.phase = to;
        info!(?from, ?to, "Tracker phase changed");
        if to != TrackerPhase::Stopped {
            self.outbox
                .push_back(Outgoing::Event(TrackerEvent::PhaseChanged { from, to }));
        }
    }
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    states: Vec<(SubscriptionHandle, StateCallback)>,
    events: Vec<(SubscriptionHandle, EventCallback)>,
}

impl Subscribers {
    fn next_handle(&mut self) -> SubscriptionHandle {
        self.next_id += 1;
        SubscriptionHandle(self.next_id)
    }

    fn contains(&self, handle: SubscriptionHandle) -> bool {
        self.states.iter().any(|(h, _)| *h == handle)
            || self.events.iter().any(|(h, _)| *h == handle)
    }

    fn remove(&mut self, handle: SubscriptionHandle) -> bool {
        let before = self.states.len() + self.events.len();
        self.states.retain(|(h, _)| *h != handle);
        self.events.retain(|(h, _)| *h != handle);
        before != self.states.len() + self.events.len()
    }
}

struct Shared {
    target: TargetLocation,
    config: TrackerConfig,
    core: Mutex<TrackerCore>,
    subscribers: Mutex<Subscribers>,
    flushing: AtomicBool,
    cancel: CancellationToken,
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("target", &self.target)
            .field("stopped", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Create a tracker for `target`, validating target and configuration
pub fn create_proximity_tracker(
    target: TargetLocation,
    config: Option<TrackerConfig>,
) -> TrackerResult<ProximityTracker> {
    ProximityTracker::new(target, config.unwrap_or_default())
}

/// Cloneable handle to one tracking session's state machine
#[derive(Clone)]
pub struct ProximityTracker {
    shared: Arc<Shared>,
}

impl fmt::Debug for ProximityTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProximityTracker")
            .field("target", &self.shared.target)
            .field("phase", &self.phase())
            .field("state", &self.current_state())
            .finish()
    }
}

/// Non-owning tracker handle, for callbacks that need to read the tracker
/// they are subscribed to without keeping it alive
#[derive(Debug, Clone)]
pub struct WeakProximityTracker {
    shared: Weak<Shared>,
}

impl WeakProximityTracker {
    pub fn upgrade(&self) -> Option<ProximityTracker> {
        self.shared.upgrade().map(|shared| ProximityTracker { shared })
    }
}

impl ProximityTracker {
    pub fn new(target: TargetLocation, config: TrackerConfig) -> TrackerResult<Self> {
        target.validate()?;
        config.validate()?;

        info!(
            latitude = target.coordinate.latitude,
            longitude = target.coordinate.longitude,
            radius_m = target.radius_m,
            "Created proximity tracker"
        );

        let core = TrackerCore {
            phase: TrackerPhase::Initializing,
            state: ProximityState::initial(),
            hysteresis: HysteresisFilter::new(config.hysteresis_window),
            staleness: StalenessMonitor::new(config.staleness_window()),
            last_accepted_ms: None,
            last_error: None,
            stop_reason: None,
            stats: TrackerStats::default(),
            outbox: VecDeque::new(),
        };

        Ok(Self {
            shared: Arc::new(Shared {
                target,
                config,
                core: Mutex::new(core),
                subscribers: Mutex::new(Subscribers::default()),
                flushing: AtomicBool::new(false),
                cancel: CancellationToken::new(),
            }),
        })
    }

    pub fn target(&self) -> &TargetLocation {
        &self.shared.target
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.shared.config
    }

    pub fn downgrade(&self) -> WeakProximityTracker {
        WeakProximityTracker {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn current_state(&self) -> ProximityState {
        self.shared.core.lock().state
    }

    pub fn phase(&self) -> TrackerPhase {
        self.shared.core.lock().phase
    }

    /// Most recent error reported by the location source, cleared by the next accepted sample
    pub fn last_error(&self) -> Option<LocationError> {
        self.shared.core.lock().last_error.clone()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.shared.core.lock().stop_reason.clone()
    }

    pub fn stats(&self) -> TrackerStats {
        self.shared.core.lock().stats
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Resolves once the tracker is stopped
    pub async fn stopped(&self) {
        self.shared.cancel.cancelled().await
    }

    /// Register a state callback. Callbacks run in registration order.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ProximityState) + Send + Sync + 'static,
    {
        let mut subscribers = self.shared.subscribers.lock();
        let handle = subscribers.next_handle();
        subscribers.states.push((handle, Arc::new(callback)));
        debug!(id = handle.id(), "State subscriber added");
        Subscription {
            handle,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Register an event callback
    pub fn subscribe_events<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&TrackerEvent) + Send + Sync + 'static,
    {
        let mut subscribers = self.shared.subscribers.lock();
        let handle = subscribers.next_handle();
        subscribers.events.push((handle, Arc::new(callback)));
        Subscription {
            handle,
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.shared.subscribers.lock().remove(handle)
    }

    /// Feed one sample, using the current time for staleness
    pub fn on_sample(&self, sample: PositionSample) -> SampleOutcome {
        self.on_sample_at(sample, Instant::now())
    }

    /// Feed one sample that arrived at `now`
    pub fn on_sample_at(&self, sample: PositionSample, now: Instant) -> SampleOutcome {
        let result = {
            let mut core = self.shared.core.lock();
            if core.phase == TrackerPhase::Stopped {
                return SampleOutcome::Ignored;
            }

            let result = self.accept(&mut core, &sample, now);
            match &result {
                Ok(SampleOutcome::Accepted { .. }) => core.stats.accepted_samples += 1,
                _ => core.stats.rejected_samples += 1,
            }
            result
        };

        match result {
            Ok(outcome) => {
                if outcome.is_accepted() {
                    self.flush();
                }
                outcome
            }
            Err(error) => {
                warn!(%error, "Distance computation failed; stopping tracker");
                self.stop_with(StopReason::InvalidCoordinate(error));
                SampleOutcome::Rejected(RejectReason::InvalidCoordinate)
            }
        }
    }

    fn accept(
        &self,
        core: &mut TrackerCore,
        sample: &PositionSample,
        now: Instant,
    ) -> Result<SampleOutcome, DistanceError> {
        if let Some(last) = core.last_accepted_ms {
            if sample.captured_at_ms <= last {
                debug!(
                    captured_at_ms = sample.captured_at_ms,
                    last_accepted_ms = last,
                    "Dropping out-of-order sample"
                );
                return Ok(SampleOutcome::Rejected(RejectReason::OutOfOrder {
                    last_accepted_ms: last,
                }));
            }
        }

        let ceiling = self.shared.config.accuracy_ceiling_m;
        let accuracy = sample.accuracy_m;
        if !(accuracy.is_finite() && accuracy >= 0.0) || accuracy > ceiling {
            debug!(accuracy_m = accuracy, ceiling_m = ceiling, "Dropping low-confidence sample");
            return Ok(SampleOutcome::Rejected(RejectReason::LowConfidence {
                accuracy_m: accuracy,
                ceiling_m: ceiling,
            }));
        }

        if !sample.coordinate.is_valid() {
            debug!(
                latitude = sample.coordinate.latitude,
                longitude = sample.coordinate.longitude,
                "Dropping sample with invalid coordinate"
            );
            return Ok(SampleOutcome::Rejected(RejectReason::InvalidCoordinate));
        }

        let target = &self.shared.target;
        let distance_m = haversine_distance(&sample.coordinate, &target.coordinate)?;
        let raw = classify(distance_m, target.radius_m);
        let outcome = core
            .hysteresis
            .update(raw, distance_m, target.radius_m, accuracy);
        if let Some(transition) = outcome.transition {
            debug!(?transition, published = ?outcome.published, distance_m, "Proximity changed");
        }

        let within_radius = outcome.published.is_within();
        core.last_accepted_ms = Some(sample.captured_at_ms);
        core.last_error = None;
        core.staleness.mark_fresh(now);
        core.state = ProximityState {
            distance_m: Some(distance_m),
            within_radius: Some(within_radius),
            last_updated_ms: Some(sample.captured_at_ms),
            staleness: Staleness::Fresh,
        };

        core.set_phase(TrackerPhase::Tracking);
        core.publish();

        Ok(SampleOutcome::Accepted {
            distance_m,
            within_radius,
        })
    }

    /// Report a location source error.
    ///
    /// The error is delivered to event subscribers. `PermissionDenied` then
    /// stops the tracker; anything else leaves it running.
    pub fn on_source_error(&self, error: LocationError) {
        {
            let mut core = self.shared.core.lock();
            if core.phase == TrackerPhase::Stopped {
                return;
            }
            core.stats.source_errors += 1;
            core.last_error = Some(error.clone());
            core.outbox
                .push_back(Outgoing::Event(TrackerEvent::SourceError(error.clone())));
        }

        warn!(%error, severity = ?error.severity(), "Location source error");
        self.flush();

        if error.is_terminal() {
            self.stop_with(StopReason::PermissionDenied);
        }
    }

    /// The source ended its stream
    pub fn on_source_closed(&self) {
        self.stop_with(StopReason::SourceClosed);
    }

    /// Re-evaluate staleness now
    pub fn refresh_staleness(&self) -> Staleness {
        self.refresh_staleness_at(Instant::now())
    }

    /// Re-evaluate staleness at `now`, publishing if it changed
    pub fn refresh_staleness_at(&self, now: Instant) -> Staleness {
        let staleness = {
            let mut core = self.shared.core.lock();
            if core.phase == TrackerPhase::Stopped {
                return core.state.staleness;
            }

            let staleness = core.staleness.evaluate(now);
            if staleness == core.state.staleness {
                return staleness;
            }
            core.state.staleness = staleness;
            core.publish();
            staleness
        };

        info!(?staleness, "Proximity state staleness changed");
        self.flush();
        staleness
    }

    /// When the current fresh state turns stale, if it is fresh
    pub fn staleness_deadline(&self) -> Option<Instant> {
        let core = self.shared.core.lock();
        if core.phase == TrackerPhase::Stopped || core.state.staleness != Staleness::Fresh {
            return None;
        }
        core.staleness.deadline()
    }

    /// Stop the tracker. No callback runs after this returns; repeated calls do nothing.
    pub fn stop(&self) {
        self.stop_with(StopReason::Requested);
    }

    fn stop_with(&self, reason: StopReason) {
        {
            let mut core = self.shared.core.lock();
            if core.phase == TrackerPhase::Stopped {
                return;
            }
            core.set_phase(TrackerPhase::Stopped);
            core.stop_reason = Some(reason.clone());
            core.outbox.clear();
        }
        self.shared.cancel.cancel();
        info!(?reason, "Proximity tracker stopped");
    }

    /// Drain the outbox. A nested call from inside a callback returns at once
    /// and leaves the queued item to the outer flusher.
    fn flush(&self) {
        loop {
            if self.shared.flushing.swap(true, Ordering::AcqRel) {
                return;
            }

            while let Some(item) = self.next_outgoing() {
                self.deliver(item);
            }

            self.shared.flushing.store(false, Ordering::Release);

            // Another thread may have queued between our last pop and the release
            let pending = {
                let core = self.shared.core.lock();
                core.phase != TrackerPhase::Stopped && !core.outbox.is_empty()
            };
            if !pending {
                return;
            }
        }
    }

    fn next_outgoing(&self) -> Option<Outgoing> {
        let mut core = self.shared.core.lock();
        if core.phase == TrackerPhase::Stopped {
            core.outbox.clear();
            return None;
        }
        core.outbox.pop_front()
    }

    fn deliver(&self, item: Outgoing) {
        match item {
            Outgoing::State(state) => {
                let callbacks = self.shared.subscribers.lock().states.clone();
                for (handle, callback) in callbacks {
                    if !self.still_subscribed(handle) {
                        continue;
                    }
                    if self.is_stopped() {
                        return;
                    }
                    callback(&state);
                }
            }
            Outgoing::Event(event) => {
                let callbacks = self.shared.subscribers.lock().events.clone();
                for (handle, callback) in callbacks {
                    if !self.still_subscribed(handle) {
                        continue;
                    }
                    if self.is_stopped() {
                        return;
                    }
                    callback(&event);
                }
            }
        }
    }

    fn still_subscribed(&self, handle: SubscriptionHandle) -> bool {
        self.shared.subscribers.lock().contains(handle)
    }
}

impl From<&ProximityTracker> for TrackerError {
    fn from(tracker: &ProximityTracker) -> Self {
        match tracker.stop_reason() {
            Some(StopReason::PermissionDenied) => TrackerError::Location(LocationError::PermissionDenied),
            Some(StopReason::InvalidCoordinate(error)) => TrackerError::InvalidTarget(error),
            _ => TrackerError::Stopped,
        }
    }
}
