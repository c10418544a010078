//! Geodesic algorithms

pub mod distance;

pub use distance::{classify, destination, haversine_distance, initial_bearing, DistanceError};
