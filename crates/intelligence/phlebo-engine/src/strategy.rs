//! The strategy cascade.
//!
//! One shape, four tiers. Each tier is a pure candidate finder
//! parameterized by radius ring, registry filter and tie-break
//! ordering; adding or removing a tier is a one-line change to
//! `default_chain`. Finders never mutate anything; the atomic claim in
//! the registry is the only commitment point.

use phlebo_config::DispatchConfig;
use phlebo_core::{rounded_km, GeoPoint, Incentive, Result, StrategyKind};
use phlebo_geo::{Candidate, GeoIndex, RadiusRing, StaffFilter};
use std::cmp::Ordering;

/// Candidate tie-break within a tier. Both orderings end on staff id so
/// an identical registry snapshot always yields an identical list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOrdering {
    ByDistance,
    /// Fewest open assignments first, then distance, for the least-busy tier
    ByLoadThenDistance,
}

/// One tier of the cascade.
#[derive(Debug, Clone)]
pub struct Strategy {
    pub kind: StrategyKind,
    pub ring: RadiusRing,
    pub filter: StaffFilter,
    pub ordering: CandidateOrdering,
}

impl Strategy {
    /// Query the index for this tier's ordered candidate list.
    pub async fn candidates(
        &self,
        origin: GeoPoint,
        geo: &dyn GeoIndex,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        match self.ordering {
            CandidateOrdering::ByDistance => {
                geo.nearest(origin, self.ring, Some(limit), self.filter).await
            }
            CandidateOrdering::ByLoadThenDistance => {
                // The index sorts by distance; re-rank by load here so the
                // distance tie-break stays consistent with the other tiers.
                let mut all = geo.nearest(origin, self.ring, None, self.filter).await?;
                all.sort_by(|a, b| {
                    a.staff
                        .current_assignments
                        .cmp(&b.staff.current_assignments)
                        .then(
                            a.distance_km
                                .partial_cmp(&b.distance_km)
                                .unwrap_or(Ordering::Equal),
                        )
                        .then_with(|| a.staff.id.cmp(&b.staff.id))
                });
                all.truncate(limit);
                Ok(all)
            }
        }
    }

    /// Outer search radius for audit records; `None` means unbounded.
    pub fn radius_km(&self) -> Option<f64> {
        self.ring.max_km
    }
}

/// Build the four automatic tiers from config.
///
/// The least-busy tier ignores the operator availability flag unless
/// `least_busy_honors_offline` says otherwise; the flag and capacity
/// are distinct notions of availability.
pub fn default_chain(config: &DispatchConfig) -> Vec<Strategy> {
    let least_busy_filter = if config.least_busy_honors_offline {
        StaffFilter::AvailableWithHeadroom
    } else {
        StaffFilter::ActiveWithHeadroom
    };

    vec![
        Strategy {
            kind: StrategyKind::Nearby,
            ring: RadiusRing::within(config.nearby_radius_km),
            filter: StaffFilter::AvailableOnly,
            ordering: CandidateOrdering::ByDistance,
        },
        Strategy {
            kind: StrategyKind::Extended,
            ring: RadiusRing::between(config.nearby_radius_km, config.extended_radius_km),
            filter: StaffFilter::AvailableOnly,
            ordering: CandidateOrdering::ByDistance,
        },
        Strategy {
            kind: StrategyKind::CityWide,
            ring: RadiusRing::unbounded(),
            filter: StaffFilter::AvailableOnly,
            ordering: CandidateOrdering::ByDistance,
        },
        Strategy {
            kind: StrategyKind::LeastBusy,
            ring: RadiusRing::unbounded(),
            filter: least_busy_filter,
            ordering: CandidateOrdering::ByLoadThenDistance,
        },
    ]
}

/// Extra pay owed for a fallback-tier assignment.
pub fn incentive_for(kind: StrategyKind, distance_km: f64, config: &DispatchConfig) -> Incentive {
    match kind {
        StrategyKind::Nearby | StrategyKind::Manual => Incentive::None,
        StrategyKind::Extended => Incentive::TravelAllowance {
            rupees: rounded_km(distance_km * config.travel_allowance_per_km),
        },
        StrategyKind::CityWide => Incentive::PremiumPay {
            rupees: rounded_km(
                config.premium_base_rupees + distance_km * config.premium_per_km_rupees,
            ),
        },
        StrategyKind::LeastBusy => Incentive::OvertimeBonus {
            percent: config.overtime_bonus_percent,
        },
    }
}

/// ETA model: base handling time plus travel, whole minutes.
pub fn eta_minutes(distance_km: f64, config: &DispatchConfig) -> i64 {
    config.eta_base_minutes + config.eta_minutes_per_km * distance_km.ceil() as i64
}
