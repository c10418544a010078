//! Tracker API
//!
//! [`ProximityTracker`] is the synchronous state machine; [`TrackingSession`]
//! drives it from a location source on a tokio runtime. Formatting and join
//! eligibility turn published states into something a UI can show.

pub mod eligibility;
pub mod formatting;
pub mod session;
pub mod tracker;
pub mod types;

pub use eligibility::{JoinEligibility, UnconfirmedReason};
pub use formatting::{CsvFormatter, FormattedProximity, JsonFormatter, ProximityFormatter, TextFormatter};
pub use session::TrackingSession;
pub use tracker::{
    create_proximity_tracker, EventCallback, ProximityTracker, StateCallback, Subscription,
    SubscriptionHandle, TrackerStats, WeakProximityTracker,
};
pub use types::{
    RejectReason, SampleOutcome, StopReason, TrackerError, TrackerEvent, TrackerPhase,
    TrackerResult,
};
