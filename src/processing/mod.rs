//! Sample processing: hysteresis and freshness

pub mod hysteresis;
pub mod staleness;

pub use hysteresis::{HysteresisFilter, HysteresisOutcome, Transition};
pub use staleness::StalenessMonitor;
