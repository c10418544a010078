//! Async tracking session
//!
//! Binds one location stream to one [`ProximityTracker`] and runs a driver
//! task that feeds samples, forwards source errors and fires the staleness
//! timer when no sample arrives. The stream is stopped on every exit path:
//! explicit stop, a subscriber stopping the tracker, permission revocation,
//! source closure, and drop.

use crate::api::tracker::ProximityTracker;
use crate::api::types::{StopReason, TrackerError, TrackerResult};
use crate::core::TargetLocation;
use crate::source::stream::sleep_until_deadline;
use crate::source::{LocationError, LocationSource, SampleStream, SourceEvent, StopHandle};
use crate::utils::config::TrackerConfig;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A running tracking session
#[derive(Debug)]
pub struct TrackingSession {
    tracker: ProximityTracker,
    stream: StopHandle,
    driver: Option<JoinHandle<()>>,
}

impl TrackingSession {
    /// Validate `target`, ask for permission and start tracking.
    ///
    /// Fails with `InvalidTarget` before touching the source, and with
    /// `Location(PermissionDenied)` without starting a stream.
    pub async fn start<S>(
        source: &S,
        target: TargetLocation,
        config: TrackerConfig,
    ) -> TrackerResult<Self>
    where
        S: LocationSource + ?Sized,
    {
        let tracker = ProximityTracker::new(target, config)?;
        Self::start_tracker(source, tracker).await
    }

    /// Start a session for an existing tracker, so subscribers registered
    /// beforehand see the very first state.
    pub async fn start_tracker<S>(source: &S, tracker: ProximityTracker) -> TrackerResult<Self>
    where
        S: LocationSource + ?Sized,
    {
        if tracker.is_stopped() {
            return Err(TrackerError::Stopped);
        }

        let permission = source.request_permission().await;
        if !permission.is_granted() {
            warn!("Location permission denied; session not started");
            return Err(TrackerError::Location(LocationError::PermissionDenied));
        }

        let mut options = tracker.config().tracking.clone();
        // Fixes the tracker will reject must not hold back the next one
        options
            .max_accuracy_m
            .get_or_insert(tracker.config().accuracy_ceiling_m);
        let stream = source.start_tracking(&options)?;
        info!(
            radius_m = tracker.target().radius_m,
            "Tracking session started"
        );

        let stop = stream.stop_handle();
        let driver = tokio::spawn(drive(tracker.clone(), stream));

        Ok(Self {
            tracker,
            stream: stop,
            driver: Some(driver),
        })
    }

    pub fn tracker(&self) -> &ProximityTracker {
        &self.tracker
    }

    pub fn is_stopped(&self) -> bool {
        self.tracker.is_stopped()
    }

    /// Stop the tracker and release the location stream. Idempotent.
    pub fn stop(&self) {
        self.tracker.stop();
        self.stream.stop();
    }

    /// Wait for the session to end on its own, returning why it stopped
    pub async fn wait(&mut self) -> StopReason {
        if let Some(driver) = self.driver.take() {
            if let Err(error) = driver.await {
                warn!(%error, "Tracking session driver failed");
                self.stop();
            }
        }
        self.tracker
            .stop_reason()
            .unwrap_or(StopReason::Requested)
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn drive(tracker: ProximityTracker, mut stream: SampleStream) {
    loop {
        let deadline = tracker.staleness_deadline();

        tokio::select! {
            biased;
            _ = tracker.stopped() => break,
            event = stream.next() => match event {
                Some(SourceEvent::Sample(sample)) => {
                    tracker.on_sample(sample);
                }
                Some(SourceEvent::Error(error)) => tracker.on_source_error(error),
                None => {
                    tracker.on_source_closed();
                    break;
                }
            },
            _ = sleep_until_deadline(deadline) => {
                tracker.refresh_staleness();
            }
        }
    }

    stream.stop();
    debug!(reason = ?tracker.stop_reason(), "Tracking session driver finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::destination;
    use crate::api::types::TrackerPhase;
    use crate::core::{Coordinate, PositionSample, ProximityState, Staleness};
    use crate::source::{LocationHub, MockLocationSource, Permission, TrackingOptions};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    fn target() -> TargetLocation {
        TargetLocation::new(Coordinate::new(40.7128, -74.0060).unwrap(), 100.0)
    }

    fn unthrottled() -> TrackingOptions {
        TrackingOptions {
            min_interval_ms: 0,
            min_distance_m: 0.0,
            ..Default::default()
        }
    }

    fn config() -> TrackerConfig {
        TrackerConfig {
            tracking: unthrottled(),
            ..Default::default()
        }
    }

    fn sample_at(distance_m: f64, captured_at_ms: u64) -> PositionSample {
        let coordinate = destination(&target().coordinate, 90.0, distance_m).unwrap();
        PositionSample::new(coordinate, 5.0, captured_at_ms)
    }

    fn record_states(tracker: &ProximityTracker) -> Arc<Mutex<Vec<ProximityState>>> {
        let states = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&states);
        tracker.subscribe(move |state| sink.lock().push(*state));
        states
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_flow_and_state_goes_stale() {
        let platform = MockLocationSource::new();
        let tracker = ProximityTracker::new(target(), config()).unwrap();
        let states = record_states(&tracker);
        let _session = TrackingSession::start_tracker(&platform, tracker.clone())
            .await
            .unwrap();
        assert_eq!(
            platform.last_options(),
            Some(TrackingOptions {
                max_accuracy_m: Some(50.0),
                ..unthrottled()
            })
        );

        platform.push_sample(sample_at(40.0, 1_000));
        settle().await;
        assert_eq!(tracker.current_state().within_radius, Some(true));
        assert_eq!(tracker.current_state().staleness, Staleness::Fresh);

        tokio::time::sleep(Duration::from_millis(9_999)).await;
        assert_eq!(tracker.current_state().staleness, Staleness::Fresh);

        tokio::time::sleep(Duration::from_millis(2)).await;
        settle().await;
        let states = states.lock();
        assert_eq!(states.len(), 2);
        assert_eq!(states[1].staleness, Staleness::Stale);
        assert_eq!(states[1].within_radius, Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_sample_after_stale_is_fresh() {
        let platform = MockLocationSource::new();
        let session = TrackingSession::start(&platform, target(), config())
            .await
            .unwrap();

        platform.push_sample(sample_at(200.0, 1_000));
        settle().await;
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(session.tracker().current_state().staleness, Staleness::Stale);

        platform.push_sample(sample_at(200.0, 16_000));
        settle().await;
        assert_eq!(session.tracker().current_state().staleness, Staleness::Fresh);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquisition_timeout_keeps_session_running() {
        let platform = MockLocationSource::new();
        let mut config = config();
        config.tracking.timeout_ms = 500;
        let tracker = ProximityTracker::new(target(), config).unwrap();
        let states = record_states(&tracker);
        let session = TrackingSession::start_tracker(&platform, tracker.clone())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(600)).await;
        settle().await;
        assert_eq!(
            tracker.last_error(),
            Some(LocationError::Timeout { timeout_ms: 500 })
        );
        assert_eq!(tracker.phase(), TrackerPhase::Initializing);
        assert!(!session.is_stopped());
        assert_eq!(platform.active_subscriptions(), 1);

        platform.push_sample(sample_at(40.0, 1_000));
        settle().await;
        assert_eq!(tracker.phase(), TrackerPhase::Tracking);

        tokio::time::sleep(Duration::from_millis(600)).await;
        settle().await;
        assert_eq!(tracker.phase(), TrackerPhase::Tracking);
        assert!(!session.is_stopped());
        assert_eq!(tracker.stats().source_errors, 2);
        assert_eq!(states.lock().len(), 1);
        assert_eq!(tracker.current_state().within_radius, Some(true));
    }

    #[tokio::test]
    async fn test_permission_denied_never_starts() {
        let platform = MockLocationSource::with_permission(Permission::Denied);
        let result = TrackingSession::start(&platform, target(), config()).await;
        assert!(matches!(
            result,
            Err(TrackerError::Location(LocationError::PermissionDenied))
        ));
        assert_eq!(platform.tracking_starts(), 0);
    }

    #[tokio::test]
    async fn test_invalid_target_fails_before_permission() {
        let platform = MockLocationSource::new();
        let bad = TargetLocation::new(target().coordinate, -5.0);
        let result = TrackingSession::start(&platform, bad, config()).await;
        assert!(matches!(result, Err(TrackerError::InvalidTarget(_))));
        assert_eq!(platform.permission_requests(), 0);
    }

    #[tokio::test]
    async fn test_revocation_stops_session() {
        let platform = MockLocationSource::new();
        let mut session = TrackingSession::start(&platform, target(), config())
            .await
            .unwrap();

        platform.push_sample(sample_at(40.0, 1_000));
        platform.revoke_permission();

        assert_eq!(session.wait().await, StopReason::PermissionDenied);
        assert!(session.is_stopped());
        assert_eq!(
            session.tracker().last_error(),
            Some(LocationError::PermissionDenied)
        );
        assert_eq!(platform.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_transient_error_keeps_running() {
        let platform = MockLocationSource::new();
        let session = TrackingSession::start(&platform, target(), config())
            .await
            .unwrap();

        platform.push_error(LocationError::unavailable("no fix"));
        settle().await;
        assert!(!session.is_stopped());
        assert!(session.tracker().last_error().is_some());

        platform.push_sample(sample_at(40.0, 1_000));
        settle().await;
        assert!(session.tracker().current_state().has_fix());
    }

    #[tokio::test]
    async fn test_stop_releases_stream() {
        let platform = MockLocationSource::new();
        let mut session = TrackingSession::start(&platform, target(), config())
            .await
            .unwrap();
        assert_eq!(platform.active_subscriptions(), 1);

        session.stop();
        session.stop();
        assert_eq!(platform.active_subscriptions(), 0);
        assert_eq!(session.wait().await, StopReason::Requested);
    }

    #[tokio::test]
    async fn test_subscriber_stop_releases_stream() {
        let platform = MockLocationSource::new();
        let tracker = ProximityTracker::new(target(), config()).unwrap();
        let stopper = tracker.clone();
        tracker.subscribe(move |state| {
            if state.within_radius == Some(true) {
                stopper.stop();
            }
        });
        let mut session = TrackingSession::start_tracker(&platform, tracker)
            .await
            .unwrap();

        platform.push_sample(sample_at(150.0, 1_000));
        platform.push_sample(sample_at(20.0, 2_000));

        assert_eq!(session.wait().await, StopReason::Requested);
        assert_eq!(platform.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_drop_releases_stream() {
        let platform = MockLocationSource::new();
        let session = TrackingSession::start(&platform, target(), config())
            .await
            .unwrap();
        let tracker = session.tracker().clone();

        drop(session);
        assert!(tracker.is_stopped());
        assert_eq!(platform.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_source_closure_ends_session() {
        let platform = MockLocationSource::new();
        let mut session = TrackingSession::start(&platform, target(), config())
            .await
            .unwrap();

        platform.close();
        assert_eq!(session.wait().await, StopReason::SourceClosed);
    }

    #[tokio::test]
    async fn test_stopped_tracker_cannot_start() {
        let platform = MockLocationSource::new();
        let tracker = ProximityTracker::new(target(), config()).unwrap();
        tracker.stop();
        let result = TrackingSession::start_tracker(&platform, tracker).await;
        assert!(matches!(result, Err(TrackerError::Stopped)));
    }

    #[tokio::test]
    async fn test_sessions_share_hub_subscription() {
        let platform = MockLocationSource::new();
        let hub = LocationHub::new(platform.clone(), unthrottled());

        let near = TrackingSession::start(&hub, target(), config()).await.unwrap();
        let far_target = TargetLocation::new(
            destination(&target().coordinate, 0.0, 5_000.0).unwrap(),
            100.0,
        );
        let far = TrackingSession::start(&hub, far_target, config()).await.unwrap();
        assert_eq!(platform.tracking_starts(), 1);
        assert_eq!(platform.permission_requests(), 1);

        platform.push_sample(sample_at(40.0, 1_000));
        settle().await;
        assert_eq!(near.tracker().current_state().within_radius, Some(true));
        assert_eq!(far.tracker().current_state().within_radius, Some(false));

        drop(near);
        settle().await;
        assert_eq!(platform.active_subscriptions(), 1);

        drop(far);
        settle().await;
        assert_eq!(platform.active_subscriptions(), 0);
    }
}
