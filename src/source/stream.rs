//! Push-based sample stream between a location source and its consumer
//!
//! A source owns the [`SampleSink`] half and pushes events as the platform
//! produces them; the consumer awaits them on the [`SampleStream`] half.
//! Stopping the stream is idempotent and is also done on drop, so platform
//! resources are released on every exit path.
//!
//! A stream created with a non-zero `timeout_ms` reports
//! [`LocationError::Timeout`] whenever that long passes without a sample,
//! then keeps waiting.

use crate::core::PositionSample;
use crate::source::error::LocationError;
use crate::source::throttle::SampleThrottle;
use crate::source::TrackingOptions;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One item delivered by a location source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Sample(PositionSample),
    Error(LocationError),
}

/// Create a connected sink/stream pair.
///
/// When `options` is given, samples pushed into the sink are throttled to the
/// requested interval and distance before delivery, and the stream enforces
/// the acquisition timeout.
pub fn sample_channel(options: Option<&TrackingOptions>) -> (SampleSink, SampleStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let throttle = options.map(|opts| Arc::new(Mutex::new(SampleThrottle::from_options(opts))));
    let timeout = options
        .map(|opts| opts.timeout_ms)
        .filter(|&ms| ms > 0)
        .map(Duration::from_millis);

    let sink = SampleSink {
        tx,
        cancel: cancel.clone(),
        throttle,
    };
    let stream = SampleStream {
        rx,
        cancel,
        timeout,
        deadline: timeout.map(|timeout| Instant::now() + timeout),
    };
    (sink, stream)
}

pub(crate) async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Producer half held by a location source
#[derive(Debug, Clone)]
pub struct SampleSink {
    tx: mpsc::UnboundedSender<SourceEvent>,
    cancel: CancellationToken,
    throttle: Option<Arc<Mutex<SampleThrottle>>>,
}

impl SampleSink {
    /// Deliver an event. Returns false once the consumer has stopped.
    ///
    /// Samples held back by the throttle count as delivered.
    pub fn push(&self, event: SourceEvent) -> bool {
        if self.is_stopped() {
            return false;
        }

        if let (SourceEvent::Sample(sample), Some(throttle)) = (&event, &self.throttle) {
            if !throttle.lock().admit(sample) {
                return true;
            }
        }

        self.tx.send(event).is_ok()
    }

    pub fn push_sample(&self, sample: PositionSample) -> bool {
        self.push(SourceEvent::Sample(sample))
    }

    pub fn push_error(&self, error: LocationError) -> bool {
        self.push(SourceEvent::Error(error))
    }

    /// True once the consumer stopped or dropped its stream
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// Owned future resolving when the consumer stops.
    ///
    /// Unlike [`stopped`](Self::stopped) it does not keep the channel open,
    /// so the source can still close the stream by dropping its sink.
    pub fn stop_signal(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let cancel = self.cancel.clone();
        async move { cancel.cancelled().await }
    }

    /// Resolves when the consumer stops; sources use this to release resources
    pub async fn stopped(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = self.tx.closed() => {}
        }
    }
}

/// Consumer half: a live, cancelable stream of [`SourceEvent`]s
#[derive(Debug)]
pub struct SampleStream {
    rx: mpsc::UnboundedReceiver<SourceEvent>,
    cancel: CancellationToken,
    timeout: Option<Duration>,
    /// When the next `Timeout` is due
    deadline: Option<Instant>,
}

impl SampleStream {
    /// Wait for the next event.
    ///
    /// Returns `None` after [`stop`](Self::stop) or when the source closes.
    /// A timeout is reported as an error event and does not end the stream.
    pub async fn next(&mut self) -> Option<SourceEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.rx.recv() => {
                if let Some(SourceEvent::Sample(_)) = event {
                    self.rearm_timeout();
                }
                event
            }
            _ = sleep_until_deadline(self.deadline) => {
                self.rearm_timeout();
                let timeout_ms = self.timeout.map_or(0, |t| t.as_millis() as u64);
                debug!(timeout_ms, "No location fix within timeout");
                Some(SourceEvent::Error(LocationError::Timeout { timeout_ms }))
            }
        }
    }

    fn rearm_timeout(&mut self) {
        self.deadline = self.timeout.map(|timeout| Instant::now() + timeout);
    }

    /// Take an already-delivered event without waiting
    pub fn try_next(&mut self) -> Option<SourceEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Terminate the stream. Calling this more than once is a no-op.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Detached handle that can stop this stream from elsewhere
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            cancel: self.cancel.clone(),
        }
    }
}

impl Drop for SampleStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Cloneable handle that stops a [`SampleStream`]
#[derive(Debug, Clone)]
pub struct StopHandle {
    cancel: CancellationToken,
}

impl StopHandle {
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
