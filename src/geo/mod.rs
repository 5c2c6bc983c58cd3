//! Coordinates, position readings and great-circle distance
//!
//! Every distance in the crate goes through [`distance`] so that the
//! proximity engine, the nearby list and the demo walk agree to the bit.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// A WGS-84 point in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both components are finite numbers
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Distance to another coordinate in meters
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance(*self, *other)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// A single reading from the location sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub coordinate: Coordinate,
    /// Accuracy radius in meters
    pub accuracy: f64,
    /// Epoch milliseconds
    pub timestamp: i64,
}

impl Position {
    pub fn new(coordinate: Coordinate, accuracy: f64, timestamp: i64) -> Self {
        Self {
            coordinate,
            accuracy: accuracy.max(0.0),
            timestamp,
        }
    }

    /// A reading stamped with the current wall clock
    pub fn now(coordinate: Coordinate, accuracy: f64) -> Self {
        Self::new(coordinate, accuracy, chrono::Utc::now().timestamp_millis())
    }
}

/// Great-circle distance between two coordinates in meters.
///
/// Haversine formula on a sphere of radius [`EARTH_RADIUS_M`]. The result is
/// symmetric and never negative; the same point yields exactly zero.
///
/// ```
/// use soundtrail::geo::{distance, Coordinate};
///
/// let a = Coordinate::new(57.7056, 11.9400);
/// let b = Coordinate::new(57.7057, 11.9401);
/// let d = distance(a, b);
/// assert!(d > 10.0 && d < 15.0);
/// assert_eq!(d, distance(b, a));
/// ```
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude * DEG_TO_RAD;
    let lat2 = b.latitude * DEG_TO_RAD;
    let delta_lat = (b.latitude - a.latitude) * DEG_TO_RAD;
    let delta_lon = (b.longitude - a.longitude) * DEG_TO_RAD;

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair outside [0, 1] for antipodal points
    let c = 2.0 * h.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Coordinate reached by moving `meters` from `origin` along `bearing_deg`
/// (0 = north, 90 = east).
///
/// Used to lay out scripted walks at known distances from a recording.
pub fn offset(origin: Coordinate, bearing_deg: f64, meters: f64) -> Coordinate {
    let angular = meters / EARTH_RADIUS_M;
    let bearing = bearing_deg * DEG_TO_RAD;
    let lat1 = origin.latitude * DEG_TO_RAD;
    let lon1 = origin.longitude * DEG_TO_RAD;

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos()).atan2(angular.cos() - lat1.sin() * lat2.sin());

    Coordinate::new(lat2 / DEG_TO_RAD, lon2 / DEG_TO_RAD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_point_is_zero() {
        let p = Coordinate::new(57.7056, 11.9400);
        assert_eq!(distance(p, p), 0.0);
    }

    #[test]
    fn test_symmetry() {
        let pairs = [
            (Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 1.0)),
            (Coordinate::new(-33.86, 151.2), Coordinate::new(51.5, -0.12)),
            (Coordinate::new(89.9, 10.0), Coordinate::new(-89.9, -170.0)),
        ];
        for (a, b) in pairs {
            assert_eq!(distance(a, b), distance(b, a));
            assert!(distance(a, b) >= 0.0);
        }
    }

    #[test]
    fn test_one_degree_latitude() {
        // One degree of arc on a 6371 km sphere
        let d = distance(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 0.0));
        assert!((d - 111_194.93).abs() < 1.0, "got {}", d);
    }

    #[test]
    fn test_antipodal_points_do_not_nan() {
        let d = distance(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 180.0));
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_M).abs() < 1.0);
    }

    #[test]
    fn test_offset_round_trips_distance() {
        let origin = Coordinate::new(57.7056, 11.9400);
        for meters in [5.0, 30.0, 45.0, 500.0] {
            let moved = offset(origin, 72.0, meters);
            assert!((distance(origin, moved) - meters).abs() < 0.01);
        }
    }

    #[test]
    fn test_position_clamps_negative_accuracy() {
        let pos = Position::new(Coordinate::new(1.0, 2.0), -3.0, 10);
        assert_eq!(pos.accuracy, 0.0);
    }
}
