//! Geographic primitives.
//!
//! Distances are great-circle kilometers via the haversine formula.
//! Comparisons always use full precision; `rounded_km` exists for
//! reporting and payload fields only.

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 point (degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Haversine distance to another point, in kilometers.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().min(1.0).asin();

        EARTH_RADIUS_KM * c
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// Round a distance to 2 decimal places for reporting.
pub fn rounded_km(km: f64) -> f64 {
    (km * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        let p = GeoPoint::new(12.9716, 77.5946);
        assert!(p.distance_km(&p) < 1e-9);
    }

    #[test]
    fn test_known_city_pair() {
        // Bangalore -> Chennai, roughly 290 km great-circle
        let blr = GeoPoint::new(12.9716, 77.5946);
        let maa = GeoPoint::new(13.0827, 80.2707);
        let d = blr.distance_km(&maa);
        assert!(d > 280.0 && d < 300.0, "got {}", d);
    }

    #[test]
    fn test_distance_symmetric() {
        let a = GeoPoint::new(12.9716, 77.5946);
        let b = GeoPoint::new(12.9352, 77.6245);
        assert!((a.distance_km(&b) - b.distance_km(&a)).abs() < 1e-9);
    }

    #[test]
    fn test_rounded_km() {
        assert_eq!(rounded_km(3.14159), 3.14);
        assert_eq!(rounded_km(9.995), 10.0);
        assert_eq!(rounded_km(0.0), 0.0);
    }
}
