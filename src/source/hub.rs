//! Shared platform subscription with fan-out
//!
//! Tracking several events at once needs one tracker per event, but each
//! tracker holding its own platform subscription would run redundant GPS
//! acquisitions. The hub starts a single platform stream on the first
//! subscriber, forwards every event to all live subscribers in order, and
//! stops the platform stream when the last subscriber goes away.
//! Acquisition timeouts are per subscriber: each stream times out on its own
//! options, and platform-level timeouts are not forwarded.
//!
//! The hub is itself a [`LocationSource`], so sessions use it transparently.

use crate::source::{
    sample_channel, LocationError, LocationResult, LocationSource, Permission, PermissionFuture,
    SampleSink, SampleStream, SourceEvent, StopHandle, TrackingOptions,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Fan-out wrapper around one platform [`LocationSource`]
pub struct LocationHub<S> {
    inner: Arc<HubInner<S>>,
}

impl<S> Clone for LocationHub<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct HubInner<S> {
    source: S,
    /// Options for the shared platform subscription
    options: TrackingOptions,
    state: Mutex<HubState>,
    /// Woken whenever a subscriber stops
    subscriber_gone: Notify,
}

#[derive(Default)]
struct HubState {
    permission: Option<Permission>,
    subscribers: Vec<SampleSink>,
    upstream: Option<StopHandle>,
}

impl<S> LocationHub<S>
where
    S: LocationSource + 'static,
{
    /// Wrap `source`; the platform subscription is started with `options`
    pub fn new(source: S, options: TrackingOptions) -> Self {
        Self {
            inner: Arc::new(HubInner {
                source,
                options,
                state: Mutex::new(HubState::default()),
                subscriber_gone: Notify::new(),
            }),
        }
    }

    /// Cached permission decision, if one has been made
    pub fn cached_permission(&self) -> Option<Permission> {
        self.inner.state.lock().permission
    }

    /// Drop the cached decision so the next request asks the platform again
    pub fn forget_permission(&self) {
        self.inner.state.lock().permission = None;
    }

    /// Number of subscribers whose stream is still live
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.inner.state.lock();
        state.subscribers.retain(|sink| !sink.is_stopped());
        state.subscribers.len()
    }

    /// Whether the shared platform subscription is running
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().upstream.is_some()
    }

    pub fn source(&self) -> &S {
        &self.inner.source
    }

    fn subscribe(&self, options: &TrackingOptions) -> LocationResult<SampleStream> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| LocationError::unavailable("location hub requires a tokio runtime"))?;

        let mut state = self.inner.state.lock();
        if state.permission == Some(Permission::Denied) {
            return Err(LocationError::PermissionDenied);
        }

        if state.upstream.is_none() {
            let upstream = self.inner.source.start_tracking(&self.inner.options)?;
            state.upstream = Some(upstream.stop_handle());
            info!("Started shared platform location subscription");
            runtime.spawn(fan_out(Arc::clone(&self.inner), upstream));
        }

        let (sink, stream) = sample_channel(Some(options));
        state.subscribers.push(sink.clone());
        debug!(subscribers = state.subscribers.len(), "Location hub subscriber added");

        let inner = Arc::clone(&self.inner);
        let stopped = sink.stop_signal();
        runtime.spawn(async move {
            stopped.await;
            inner.subscriber_gone.notify_one();
        });

        Ok(stream)
    }
}

impl<S> LocationSource for LocationHub<S>
where
    S: LocationSource + 'static,
{
    fn request_permission(&self) -> PermissionFuture<'_> {
        Box::pin(async move {
            if let Some(permission) = self.cached_permission() {
                return permission;
            }

            let permission = self.inner.source.request_permission().await;
            self.inner.state.lock().permission = Some(permission);
            permission
        })
    }

    fn start_tracking(&self, options: &TrackingOptions) -> LocationResult<SampleStream> {
        self.subscribe(options)
    }
}

/// Forward platform events to every live subscriber until none remain
async fn fan_out<S>(inner: Arc<HubInner<S>>, mut upstream: SampleStream) {
    loop {
        tokio::select! {
            event = upstream.next() => {
                let Some(event) = event else {
                    debug!("Platform location stream closed");
                    break;
                };

                if let SourceEvent::Error(LocationError::Timeout { timeout_ms }) = &event {
                    debug!(
                        timeout_ms = *timeout_ms,
                        "Platform stream timed out; subscribers time out on their own"
                    );
                    continue;
                }

                let revoked = matches!(&event, SourceEvent::Error(LocationError::PermissionDenied));
                let subscribers = {
                    let mut state = inner.state.lock();
                    state.subscribers.retain(|sink| !sink.is_stopped());
                    state.subscribers.clone()
                };
                for sink in &subscribers {
                    sink.push(event.clone());
                }

                if revoked {
                    warn!("Location permission revoked; closing all hub subscribers");
                    inner.state.lock().permission = None;
                    break;
                }
            }
            _ = inner.subscriber_gone.notified() => {}
        }

        let mut state = inner.state.lock();
        state.subscribers.retain(|sink| !sink.is_stopped());
        if state.subscribers.is_empty() {
            debug!("No hub subscribers left");
            break;
        }
    }

    upstream.stop();
    let mut state = inner.state.lock();
    // Dropping the sinks ends every subscriber stream
    state.subscribers.clear();
    state.upstream = None;
    info!("Stopped shared platform location subscription");
}
