//! Location source abstraction
//!
//! Bridges a platform positioning capability into a uniform, push-based
//! stream of [`PositionSample`](crate::core::PositionSample)s, hiding
//! permission handling and platform sampling differences.
//!
//! # Architecture
//!
//! ```text
//! Platform GPS ──► LocationSource ──► SampleSink ═══► SampleStream ──► consumer
//!                  (permission,       (throttle)      (cancelable,
//!                   start_tracking)                    stop on drop)
//! ```
//!
//! [`LocationHub`] wraps one platform source and fans a single platform
//! subscription out to any number of consumers.

pub mod error;
pub mod hub;
pub mod mock;
pub mod stream;
pub mod throttle;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

pub use error::{ErrorSeverity, LocationError, LocationResult};
pub use hub::LocationHub;
pub use mock::MockLocationSource;
pub use stream::{sample_channel, SampleSink, SampleStream, SourceEvent, StopHandle};
pub use throttle::SampleThrottle;

/// Outcome of a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    Granted,
    Denied,
}

impl Permission {
    pub fn is_granted(self) -> bool {
        matches!(self, Permission::Granted)
    }
}

/// Accuracy tier requested from the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredAccuracy {
    Low,
    Medium,
    High,
}

/// Sampling parameters passed when tracking starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingOptions {
    pub desired_accuracy: DesiredAccuracy,
    /// Minimum time between delivered samples (ms)
    pub min_interval_ms: u64,
    /// Minimum movement between delivered samples (m)
    pub min_distance_m: f64,
    /// Time without a fix before the stream reports `Timeout` (ms, 0 disables)
    pub timeout_ms: u64,
    /// Fixes less accurate than this are passed on unthrottled and do not
    /// count as the throttle's reference point (m)
    pub max_accuracy_m: Option<f64>,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            desired_accuracy: DesiredAccuracy::High,
            min_interval_ms: 1_000,
            min_distance_m: 0.5,
            timeout_ms: 10_000,
            max_accuracy_m: None,
        }
    }
}

/// Boxed future returned by [`LocationSource::request_permission`]
pub type PermissionFuture<'a> = Pin<Box<dyn Future<Output = Permission> + Send + 'a>>;

/// Platform positioning capability.
///
/// Uses boxed futures so sources can be used as trait objects.
pub trait LocationSource: Send + Sync {
    /// Ask for location access. May prompt the user.
    fn request_permission(&self) -> PermissionFuture<'_>;

    /// Start delivering samples. Fails with
    /// [`LocationError::PermissionDenied`] when access has not been granted.
    fn start_tracking(&self, options: &TrackingOptions) -> LocationResult<SampleStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = TrackingOptions::default();
        assert_eq!(options.desired_accuracy, DesiredAccuracy::High);
        assert_eq!(options.min_interval_ms, 1_000);
        assert_eq!(options.min_distance_m, 0.5);
        assert!(options.max_accuracy_m.is_none());
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: TrackingOptions =
            serde_json::from_str(r#"{"desired_accuracy":"medium","min_interval_ms":500}"#)
                .unwrap();
        assert_eq!(options.desired_accuracy, DesiredAccuracy::Medium);
        assert_eq!(options.min_interval_ms, 500);
        assert_eq!(options.timeout_ms, 10_000);
    }
}
