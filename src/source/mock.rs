//! Mock location source for testing and replay

use crate::core::PositionSample;
use crate::source::{
    sample_channel, LocationError, LocationResult, LocationSource, Permission, PermissionFuture,
    SampleSink, SampleStream, SourceEvent, TrackingOptions,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Scripted location source.
///
/// Clones share state, so a test can keep one handle while a session owns
/// another and inject samples or errors into every live subscription.
#[derive(Debug, Clone)]
pub struct MockLocationSource {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Debug)]
struct MockState {
    permission: Permission,
    permission_requests: u32,
    tracking_starts: u32,
    last_options: Option<TrackingOptions>,
    sinks: Vec<SampleSink>,
}

impl Default for MockLocationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLocationSource {
    /// Create a mock source that grants permission
    pub fn new() -> Self {
        Self::with_permission(Permission::Granted)
    }

    /// Create a mock source that answers permission requests with `permission`
    pub fn with_permission(permission: Permission) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState {
                permission,
                permission_requests: 0,
                tracking_starts: 0,
                last_options: None,
                sinks: Vec::new(),
            })),
        }
    }

    pub fn set_permission(&self, permission: Permission) {
        self.inner.lock().permission = permission;
    }

    /// Deliver a sample to every live subscription. Returns how many received it.
    pub fn push_sample(&self, sample: PositionSample) -> usize {
        self.broadcast(SourceEvent::Sample(sample))
    }

    /// Deliver an error to every live subscription. Returns how many received it.
    pub fn push_error(&self, error: LocationError) -> usize {
        self.broadcast(SourceEvent::Error(error))
    }

    /// Simulate the user revoking access while tracking.
    ///
    /// Every subscription receives `PermissionDenied` and is then closed.
    pub fn revoke_permission(&self) -> usize {
        let sinks = {
            let mut state = self.inner.lock();
            state.permission = Permission::Denied;
            std::mem::take(&mut state.sinks)
        };
        sinks
            .iter()
            .filter(|sink| sink.push_error(LocationError::PermissionDenied))
            .count()
    }

    /// Close every subscription as if the platform stopped producing fixes
    pub fn close(&self) {
        self.inner.lock().sinks.clear();
    }

    /// Number of subscriptions whose consumer has not stopped
    pub fn active_subscriptions(&self) -> usize {
        let mut state = self.inner.lock();
        state.sinks.retain(|sink| !sink.is_stopped());
        state.sinks.len()
    }

    pub fn permission_requests(&self) -> u32 {
        self.inner.lock().permission_requests
    }

    pub fn tracking_starts(&self) -> u32 {
        self.inner.lock().tracking_starts
    }

    /// Options passed to the most recent `start_tracking` call
    pub fn last_options(&self) -> Option<TrackingOptions> {
        self.inner.lock().last_options.clone()
    }

    fn broadcast(&self, event: SourceEvent) -> usize {
        // Snapshot so consumers reacting synchronously cannot deadlock on the state lock
        let sinks = {
            let mut state = self.inner.lock();
            state.sinks.retain(|sink| !sink.is_stopped());
            state.sinks.clone()
        };
        sinks
            .iter()
            .filter(|sink| sink.push(event.clone()))
            .count()
    }
}

impl LocationSource for MockLocationSource {
    fn request_permission(&self) -> PermissionFuture<'_> {
        let permission = {
            let mut state = self.inner.lock();
            state.permission_requests += 1;
            state.permission
        };
        Box::pin(std::future::ready(permission))
    }

    fn start_tracking(&self, options: &TrackingOptions) -> LocationResult<SampleStream> {
        let mut state = self.inner.lock();
        if !state.permission.is_granted() {
            return Err(LocationError::PermissionDenied);
        }

        let (sink, stream) = sample_channel(Some(options));
        state.sinks.push(sink);
        state.tracking_starts += 1;
        state.last_options = Some(options.clone());
        Ok(stream)
    }
}
