//! Address resolution boundary.
//!
//! Geocoding runs at order creation, upstream of the engine. The
//! contract is deliberately infallible: a failed lookup degrades to a
//! documented fallback point rather than blocking the order, and the
//! accuracy field tells downstream consumers what they got.

use async_trait::async_trait;
use phlebo_core::GeoPoint;
use serde::{Deserialize, Serialize};

/// How precise a resolved point is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeAccuracy {
    Rooftop,
    Street,
    /// Postal-code centroid
    Postal,
    /// Provider failed; the configured city-center default was used
    Fallback,
}

/// A resolved collection point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoResolution {
    pub point: GeoPoint,
    pub accuracy: GeocodeAccuracy,
    /// Which provider produced the point ("nominatim", "fallback", ...)
    pub source: String,
}

/// Resolution contract. Never errors: a best-effort point always comes
/// back, and callers inspect `accuracy` when precision matters.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve(&self, address: &str, postal_code: &str) -> GeoResolution;
}

/// Always answers with a configured default point.
///
/// Stands in when no provider is wired up, and serves as the terminal
/// fallback behind real providers.
pub struct FallbackGeocoder {
    default_point: GeoPoint,
}

impl FallbackGeocoder {
    pub fn new(default_point: GeoPoint) -> Self {
        Self { default_point }
    }
}

#[async_trait]
impl Geocoder for FallbackGeocoder {
    async fn resolve(&self, _address: &str, _postal_code: &str) -> GeoResolution {
        GeoResolution {
            point: self.default_point,
            accuracy: GeocodeAccuracy::Fallback,
            source: "fallback".to_string(),
        }
    }
}
