//! Spatial queries over technician locations.
//!
//! The index answers one question: nearest technicians to a collection
//! point, within a radius ring, matching a registry-state filter. Each
//! query reads a single registry snapshot, so results are internally
//! consistent; consistency across a whole cascade run is not promised
//! and not needed; the claim step re-checks everything atomically.
//!
//! An empty result is an ordinary answer, never an error.

use async_trait::async_trait;
use phlebo_core::{GeoPoint, Result, Technician};
use phlebo_registry::StaffRegistry;
use std::cmp::Ordering;
use std::sync::Arc;

/// Radius band in kilometers. `min_km` is exclusive, `max_km` inclusive,
/// so adjacent tiers (0–10, 10–25) partition cleanly with the boundary
/// belonging to the inner tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusRing {
    pub min_km: Option<f64>,
    pub max_km: Option<f64>,
}

impl RadiusRing {
    pub fn within(max_km: f64) -> Self {
        Self {
            min_km: None,
            max_km: Some(max_km),
        }
    }

    pub fn between(min_km: f64, max_km: f64) -> Self {
        Self {
            min_km: Some(min_km),
            max_km: Some(max_km),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            min_km: None,
            max_km: None,
        }
    }

    pub fn contains(&self, distance_km: f64) -> bool {
        if let Some(min) = self.min_km {
            if distance_km <= min {
                return false;
            }
        }
        if let Some(max) = self.max_km {
            if distance_km > max {
                return false;
            }
        }
        true
    }
}

/// Registry-state predicate applied at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaffFilter {
    /// Availability flag set: active, under capacity, not forced offline
    AvailableOnly,
    /// Active with capacity headroom, ignoring the availability flag
    /// (the least-busy tier's view of the world)
    ActiveWithHeadroom,
    /// Active with headroom AND not forced offline
    AvailableWithHeadroom,
}

impl StaffFilter {
    pub fn matches(&self, tech: &Technician) -> bool {
        match self {
            StaffFilter::AvailableOnly => tech.is_available,
            StaffFilter::ActiveWithHeadroom => tech.is_active && tech.has_capacity(),
            StaffFilter::AvailableWithHeadroom => {
                tech.is_active && tech.is_available && tech.has_capacity()
            }
        }
    }
}

/// A technician matched by a spatial query.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub staff: Technician,
    /// Full precision; round only when reporting
    pub distance_km: f64,
}

/// Spatial query contract consumed by the strategy chain.
#[async_trait]
pub trait GeoIndex: Send + Sync {
    /// K nearest technicians inside `ring` matching `filter`, ascending
    /// by (distance, staff id). `limit: None` returns every match.
    async fn nearest(
        &self,
        origin: GeoPoint,
        ring: RadiusRing,
        limit: Option<usize>,
        filter: StaffFilter,
    ) -> Result<Vec<Candidate>>;
}

/// Linear haversine scan over a registry snapshot.
///
/// Fleet sizes here are hundreds of technicians per city; a scan per
/// assignment is well under the latency budget and keeps the index
/// trivially in sync with the registry.
pub struct LinearGeoIndex {
    registry: Arc<dyn StaffRegistry>,
}

impl LinearGeoIndex {
    pub fn new(registry: Arc<dyn StaffRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl GeoIndex for LinearGeoIndex {
    async fn nearest(
        &self,
        origin: GeoPoint,
        ring: RadiusRing,
        limit: Option<usize>,
        filter: StaffFilter,
    ) -> Result<Vec<Candidate>> {
        let snapshot = self.registry.snapshot().await?;

        let mut matched: Vec<Candidate> = snapshot
            .into_iter()
            .filter(|t| filter.matches(t))
            .map(|t| {
                let distance_km = origin.distance_km(&t.location);
                Candidate {
                    staff: t,
                    distance_km,
                }
            })
            .filter(|c| ring.contains(c.distance_km))
            .collect();

        matched.sort_by(|a, b| {
            a.distance_km
                .partial_cmp(&b.distance_km)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.staff.id.cmp(&b.staff.id))
        });

        if let Some(limit) = limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phlebo_registry::MemoryStaffRegistry;

    const ORIGIN: GeoPoint = GeoPoint {
        lat: 12.9716,
        lon: 77.5946,
    };

    /// Roughly `km` kilometers north of the origin.
    fn point_at_km(km: f64) -> GeoPoint {
        GeoPoint::new(ORIGIN.lat + km / 111.0, ORIGIN.lon)
    }

    async fn seeded_index(distances: &[f64]) -> (Arc<MemoryStaffRegistry>, LinearGeoIndex) {
        let registry = MemoryStaffRegistry::new();
        for (i, km) in distances.iter().enumerate() {
            let tech = Technician::new(
                format!("tech-{}", i),
                format!("+91-90000000{:02}", i),
                point_at_km(*km),
            );
            registry.upsert(tech).await.expect("upsert");
        }
        let index = LinearGeoIndex::new(registry.clone() as Arc<dyn StaffRegistry>);
        (registry, index)
    }

    #[test]
    fn test_ring_boundaries() {
        let nearby = RadiusRing::within(10.0);
        assert!(nearby.contains(10.0));
        assert!(!nearby.contains(10.01));

        let extended = RadiusRing::between(10.0, 25.0);
        assert!(!extended.contains(10.0));
        assert!(extended.contains(10.01));
        assert!(extended.contains(25.0));
        assert!(!extended.contains(25.5));

        assert!(RadiusRing::unbounded().contains(4000.0));
    }

    #[tokio::test]
    async fn test_nearest_sorted_ascending() {
        let (_registry, index) = seeded_index(&[8.0, 2.0, 5.0]).await;
        let found = index
            .nearest(ORIGIN, RadiusRing::within(10.0), None, StaffFilter::AvailableOnly)
            .await
            .expect("query");
        assert_eq!(found.len(), 3);
        assert!(found[0].distance_km < found[1].distance_km);
        assert!(found[1].distance_km < found[2].distance_km);
    }

    #[tokio::test]
    async fn test_ring_excludes_out_of_band() {
        let (_registry, index) = seeded_index(&[3.0, 15.0, 40.0]).await;
        let extended = index
            .nearest(
                ORIGIN,
                RadiusRing::between(10.0, 25.0),
                None,
                StaffFilter::AvailableOnly,
            )
            .await
            .expect("query");
        assert_eq!(extended.len(), 1);
        assert!(extended[0].distance_km > 10.0 && extended[0].distance_km <= 25.0);
    }

    #[tokio::test]
    async fn test_empty_result_is_ok() {
        let (_registry, index) = seeded_index(&[]).await;
        let found = index
            .nearest(ORIGIN, RadiusRing::unbounded(), None, StaffFilter::AvailableOnly)
            .await
            .expect("query");
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_filter_views_differ_for_offline_staff() {
        let (registry, index) = seeded_index(&[4.0]).await;
        let snapshot = registry.snapshot().await.expect("snapshot");
        registry
            .update_availability(snapshot[0].id, false)
            .await
            .expect("offline");

        let available = index
            .nearest(ORIGIN, RadiusRing::unbounded(), None, StaffFilter::AvailableOnly)
            .await
            .expect("query");
        assert!(available.is_empty());

        let active = index
            .nearest(
                ORIGIN,
                RadiusRing::unbounded(),
                None,
                StaffFilter::ActiveWithHeadroom,
            )
            .await
            .expect("query");
        assert_eq!(active.len(), 1);

        let strict = index
            .nearest(
                ORIGIN,
                RadiusRing::unbounded(),
                None,
                StaffFilter::AvailableWithHeadroom,
            )
            .await
            .expect("query");
        assert!(strict.is_empty());
    }

    #[tokio::test]
    async fn test_limit_truncates() {
        let (_registry, index) = seeded_index(&[1.0, 2.0, 3.0, 4.0]).await;
        let found = index
            .nearest(
                ORIGIN,
                RadiusRing::unbounded(),
                Some(2),
                StaffFilter::AvailableOnly,
            )
            .await
            .expect("query");
        assert_eq!(found.len(), 2);
        assert!(found[0].distance_km < found[1].distance_km);
    }
}
