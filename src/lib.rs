//! Proximity & Live-Location Tracking Engine
//!
//! Decides, continuously and with bounded latency, whether a device is
//! physically near an event location. Position samples from a platform
//! location source are classified against the event radius on a spherical
//! Earth model, smoothed with hysteresis so GPS noise at the boundary does
//! not flap, and published to subscribers together with how fresh the
//! reading is.

pub mod algorithms;
pub mod api;
pub mod core;
pub mod processing;
pub mod source;
pub mod utils;

// Re-export commonly used types
pub use algorithms::{classify, haversine_distance, DistanceError};
pub use api::{
    create_proximity_tracker, JoinEligibility, ProximityTracker, SampleOutcome, StopReason,
    TrackerError, TrackerEvent, TrackerPhase, TrackerResult, TrackingSession,
};
pub use core::{
    Coordinate, PositionSample, Proximity, ProximityState, Staleness, TargetLocation,
    EARTH_RADIUS_M,
};
pub use source::{
    LocationError, LocationHub, LocationSource, MockLocationSource, Permission, SampleStream,
    TrackingOptions,
};
pub use utils::{ConfigError, TrackerConfig};
