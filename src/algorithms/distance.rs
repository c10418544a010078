//! Great-circle distance on a spherical Earth and radius classification

use crate::core::{Coordinate, Proximity, EARTH_RADIUS_M};
use thiserror::Error;

/// Distance engine errors. These indicate bad input, never transient conditions.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum DistanceError {
    #[error("invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("invalid radius: {radius_m} m (must be positive and finite)")]
    InvalidRadius { radius_m: f64 },
}

/// Haversine distance between two coordinates, in meters.
///
/// Symmetric, zero for identical points and never negative.
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> Result<f64, DistanceError> {
    a.validate()?;
    b.validate()?;

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    // Rounding can push h marginally past 1 for antipodal points
    let c = 2.0 * h.clamp(0.0, 1.0).sqrt().asin();

    Ok(EARTH_RADIUS_M * c)
}

/// Inclusive radius test: `Within` iff `distance_m <= radius_m`
pub fn classify(distance_m: f64, radius_m: f64) -> Proximity {
    Proximity::from_within(distance_m <= radius_m)
}

/// Initial bearing from `from` towards `to` in degrees (0-360, 0 = north)
pub fn initial_bearing(from: &Coordinate, to: &Coordinate) -> Result<f64, DistanceError> {
    from.validate()?;
    to.validate()?;

    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();

    Ok(y.atan2(x).to_degrees().rem_euclid(360.0))
}

/// Point reached by travelling `distance_m` from `origin` along `bearing_deg`
pub fn destination(
    origin: &Coordinate,
    bearing_deg: f64,
    distance_m: f64,
) -> Result<Coordinate, DistanceError> {
    origin.validate()?;

    let angular = distance_m / EARTH_RADIUS_M;
    let bearing = bearing_deg.to_radians();
    let lat1 = origin.latitude.to_radians();
    let lon1 = origin.longitude.to_radians();

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());

    // Normalise longitude back into [-180, 180]
    let longitude = (lon2.to_degrees() + 540.0).rem_euclid(360.0) - 180.0;

    Coordinate::new(lat2.to_degrees(), longitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn coord(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate::new(latitude, longitude).unwrap()
    }

    #[test]
    fn test_one_degree_of_longitude_at_equator() {
        let d = haversine_distance(&coord(0.0, 0.0), &coord(0.0, 1.0)).unwrap();
        assert!((d - 111_195.0).abs() < 50.0, "got {} m", d);
    }

    #[test]
    fn test_known_city_pair() {
        // San Francisco to Los Angeles, roughly 559 km on the sphere
        let sf = coord(37.7749, -122.4194);
        let la = coord(34.0522, -118.2437);
        let d = haversine_distance(&sf, &la).unwrap();
        assert!(d > 550_000.0 && d < 570_000.0, "got {} m", d);
    }

    #[test]
    fn test_antipodal_points() {
        let d = haversine_distance(&coord(0.0, 0.0), &coord(0.0, 180.0)).unwrap();
        let half_circumference = std::f64::consts::PI * EARTH_RADIUS_M;
        assert!((d - half_circumference).abs() < 1.0);
    }

    #[test]
    fn test_invalid_coordinate_rejected() {
        let bad = Coordinate {
            latitude: 91.0,
            longitude: 0.0,
        };
        let err = haversine_distance(&bad, &coord(0.0, 0.0)).unwrap_err();
        assert!(matches!(err, DistanceError::InvalidCoordinate { .. }));

        let nan = Coordinate {
            latitude: 0.0,
            longitude: f64::NAN,
        };
        assert!(haversine_distance(&coord(0.0, 0.0), &nan).is_err());
    }

    #[test]
    fn test_classify_boundary_is_inclusive() {
        assert_eq!(classify(100.0, 100.0), Proximity::Within);
        assert_eq!(classify(99.9, 100.0), Proximity::Within);
        assert_eq!(classify(100.0001, 100.0), Proximity::Outside);
        assert_eq!(classify(0.0, 10.0), Proximity::Within);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = coord(0.0, 0.0);
        let north = initial_bearing(&origin, &coord(1.0, 0.0)).unwrap();
        let east = initial_bearing(&origin, &coord(0.0, 1.0)).unwrap();
        let south = initial_bearing(&origin, &coord(-1.0, 0.0)).unwrap();
        let west = initial_bearing(&origin, &coord(0.0, -1.0)).unwrap();

        assert!(north.abs() < 0.01);
        assert!((east - 90.0).abs() < 0.01);
        assert!((south - 180.0).abs() < 0.01);
        assert!((west - 270.0).abs() < 0.01);
    }

    #[test]
    fn test_destination_lands_at_requested_distance() {
        let target = coord(37.7749, -122.4194);
        for (bearing, distance) in [(0.0, 150.0), (90.0, 90.0), (225.0, 1_000.0)] {
            let point = destination(&target, bearing, distance).unwrap();
            let measured = haversine_distance(&target, &point).unwrap();
            assert!(
                (measured - distance).abs() < 0.01,
                "bearing {}: expected {} m, got {} m",
                bearing,
                distance,
                measured
            );
        }
    }

    #[test]
    fn test_destination_wraps_longitude() {
        let point = destination(&coord(0.0, 179.9999), 90.0, 1_000.0).unwrap();
        assert!(point.longitude < -179.0);
        assert!(point.is_valid());
    }

    fn valid_coordinate() -> impl Strategy<Value = Coordinate> {
        (-90.0f64..=90.0, -180.0f64..=180.0).prop_map(|(latitude, longitude)| Coordinate {
            latitude,
            longitude,
        })
    }

    proptest! {
        #[test]
        fn prop_distance_is_symmetric(a in valid_coordinate(), b in valid_coordinate()) {
            let ab = haversine_distance(&a, &b).unwrap();
            let ba = haversine_distance(&b, &a).unwrap();
            prop_assert!((ab - ba).abs() < 1e-6);
        }

        #[test]
        fn prop_distance_to_self_is_zero(a in valid_coordinate()) {
            prop_assert_eq!(haversine_distance(&a, &a).unwrap(), 0.0);
        }

        #[test]
        fn prop_distance_is_bounded(a in valid_coordinate(), b in valid_coordinate()) {
            let d = haversine_distance(&a, &b).unwrap();
            prop_assert!(d >= 0.0);
            prop_assert!(d <= std::f64::consts::PI * EARTH_RADIUS_M + 1e-6);
        }
    }
}
