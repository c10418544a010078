//! Common API types and data structures

use crate::algorithms::DistanceError;
use crate::source::LocationError;
use crate::utils::config::ConfigError;
use thiserror::Error;

/// Result type for tracker operations
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Tracker and session errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    /// The target location is malformed; the session never starts
    #[error("invalid target: {0}")]
    InvalidTarget(#[from] DistanceError),

    /// Tracker configuration rejected
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// Failure reported by the location source
    #[error("location source error: {0}")]
    Location(#[from] LocationError),

    /// Operation attempted on a stopped tracker
    #[error("tracker is stopped")]
    Stopped,
}

/// Lifecycle of a tracking session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerPhase {
    /// No sample accepted yet
    Initializing,
    /// Samples are arriving
    Tracking,
    /// Terminal; nothing further is published
    Stopped,
}

/// Why a tracker reached [`TrackerPhase::Stopped`]
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// `stop()` was called
    Requested,
    /// The location source reported `PermissionDenied`
    PermissionDenied,
    /// The location source ended its stream
    SourceClosed,
    /// Distance to the target could not be computed
    InvalidCoordinate(DistanceError),
}

/// Non-state notifications delivered to event subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    PhaseChanged {
        from: TrackerPhase,
        to: TrackerPhase,
    },
    /// A location source error; transient ones leave the session running
    SourceError(LocationError),
}

/// Why a sample was not accepted
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    /// Captured at or before the last accepted sample
    OutOfOrder { last_accepted_ms: u64 },
    /// Accuracy worse than the configured ceiling (or not a valid number)
    LowConfidence { accuracy_m: f64, ceiling_m: f64 },
    /// The sample's own coordinate is out of range
    InvalidCoordinate,
}

/// What `on_sample` did with a sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// Accepted; the state was recomputed and published
    Accepted { distance_m: f64, within_radius: bool },
    Rejected(RejectReason),
    /// The tracker is stopped; the sample was ignored
    Ignored,
}

impl SampleOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SampleOutcome::Accepted { .. })
    }
}
