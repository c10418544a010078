//! Core data types for the proximity engine

use crate::algorithms::distance::DistanceError;
use serde::{Deserialize, Serialize};

/// Geographic point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting out-of-range or non-finite values
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, DistanceError> {
        let coordinate = Self { latitude, longitude };
        coordinate.validate()?;
        Ok(coordinate)
    }

    /// Check that latitude is in [-90, 90] and longitude in [-180, 180]
    pub fn validate(&self) -> Result<(), DistanceError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(DistanceError::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// One position fix produced by a location source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub coordinate: Coordinate,
    /// Horizontal accuracy radius reported by the platform (m)
    pub accuracy_m: f64,
    /// Capture time (milliseconds since epoch)
    pub captured_at_ms: u64,
}

impl PositionSample {
    pub fn new(coordinate: Coordinate, accuracy_m: f64, captured_at_ms: u64) -> Self {
        Self {
            coordinate,
            accuracy_m,
            captured_at_ms,
        }
    }
}

/// The event location a session measures proximity against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetLocation {
    pub coordinate: Coordinate,
    pub radius_m: f64,
}

impl TargetLocation {
    pub fn new(coordinate: Coordinate, radius_m: f64) -> Self {
        Self {
            coordinate,
            radius_m,
        }
    }

    /// A target is usable when its coordinate is legal and its radius is a positive finite number
    pub fn validate(&self) -> Result<(), DistanceError> {
        self.coordinate.validate()?;
        if !(self.radius_m.is_finite() && self.radius_m > 0.0) {
            return Err(DistanceError::InvalidRadius {
                radius_m: self.radius_m,
            });
        }
        Ok(())
    }
}

/// Raw radius classification of a single distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Proximity {
    Within,
    Outside,
}

impl Proximity {
    pub fn is_within(self) -> bool {
        matches!(self, Proximity::Within)
    }

    pub fn from_within(within: bool) -> Self {
        if within {
            Proximity::Within
        } else {
            Proximity::Outside
        }
    }
}

/// Freshness of the published proximity state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Staleness {
    /// An accepted sample arrived within the staleness window
    Fresh,
    /// The last accepted sample is older than the staleness window
    Stale,
    /// No sample has been accepted yet
    Unknown,
}

/// Proximity snapshot published to subscribers.
///
/// `None` fields mean no sample has been accepted yet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProximityState {
    pub distance_m: Option<f64>,
    pub within_radius: Option<bool>,
    /// Capture time of the last accepted sample (milliseconds since epoch)
    pub last_updated_ms: Option<u64>,
    pub staleness: Staleness,
}

impl ProximityState {
    /// State of a session that has not accepted any sample
    pub fn initial() -> Self {
        Self {
            distance_m: None,
            within_radius: None,
            last_updated_ms: None,
            staleness: Staleness::Unknown,
        }
    }

    pub fn has_fix(&self) -> bool {
        self.distance_m.is_some()
    }
}

impl Default for ProximityState {
    fn default() -> Self {
        Self::initial()
    }
}
