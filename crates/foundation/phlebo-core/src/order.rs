//! Order types and the assignment status machine.
//!
//! Orders are created at payment confirmation and never deleted; they
//! only transition toward a terminal status. Assignment fields are
//! mutated exclusively by the engine; collection/report workflows touch
//! the status alone.

use crate::geo::GeoPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a lab-test order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Paid, not yet picked up by the engine
    Created,
    /// An assignment task currently owns this order
    AssignmentPending,
    /// A technician is committed
    Assigned,
    /// An assignment attempt failed and may be retried
    AssignmentFailed,
    /// All automatic strategies exhausted, operator must act
    ManualAssignmentRequired,
    /// Sample picked up at the collection point
    SampleCollected,
    /// Sample at the lab
    Processing,
    /// Report delivered
    Completed,
    /// Cancelled by patient or operator
    Cancelled,
}

impl OrderStatus {
    /// Terminal statuses are never transitioned away from.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Statuses from which the automatic engine may start an attempt.
    ///
    /// `AssignmentPending` is excluded: exactly one concurrent attempt
    /// owns an order, and a duplicate trigger must be rejected.
    pub fn assignment_eligible(&self) -> bool {
        matches!(self, OrderStatus::Created | OrderStatus::AssignmentFailed)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Created => "created",
            OrderStatus::AssignmentPending => "assignment_pending",
            OrderStatus::Assigned => "assigned",
            OrderStatus::AssignmentFailed => "assignment_failed",
            OrderStatus::ManualAssignmentRequired => "manual_assignment_required",
            OrderStatus::SampleCollected => "sample_collected",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Which tier of the cascade produced an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// 0–10 km, available staff
    Nearby,
    /// 10–25 km ring, available staff
    Extended,
    /// Unbounded radius, available staff
    CityWide,
    /// Unbounded, active staff with headroom regardless of availability
    LeastBusy,
    /// Operator-driven assignment from the manual queue
    Manual,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StrategyKind::Nearby => "nearby",
            StrategyKind::Extended => "extended",
            StrategyKind::CityWide => "city_wide",
            StrategyKind::LeastBusy => "least_busy",
            StrategyKind::Manual => "manual",
        };
        write!(f, "{}", s)
    }
}

/// Extra compensation owed to a technician for a non-standard assignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Incentive {
    /// Standard assignment, no extra pay
    None,
    /// Per-km allowance for the extended ring
    TravelAllowance { rupees: f64 },
    /// Base + per-km premium for city-wide pickups
    PremiumPay { rupees: f64 },
    /// Percentage bonus for taking an order while already loaded
    OvertimeBonus { percent: u32 },
}

impl Incentive {
    pub fn is_none(&self) -> bool {
        matches!(self, Incentive::None)
    }
}

/// The committed technician slot on an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedStaff {
    pub staff_id: Uuid,
    pub strategy: StrategyKind,
    /// Rounded to 2 decimal places for reporting
    pub distance_km: f64,
    pub assigned_at: DateTime<Utc>,
    pub estimated_arrival: DateTime<Utc>,
}

/// A paid lab-test order awaiting (or holding) a field assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// Geocoded collection point; `None` means geocoding never resolved
    pub collection_location: Option<GeoPoint>,
    pub status: OrderStatus,
    pub assigned_staff: Option<AssignedStaff>,
    /// Append-only audit trail of why automatic assignment failed
    pub assignment_failure_reasons: Vec<String>,
    pub retry_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a freshly paid order ready for dispatch.
    pub fn new(patient_id: Uuid, collection_location: Option<GeoPoint>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            patient_id,
            collection_location,
            status: OrderStatus::Created,
            assigned_staff: None,
            assignment_failure_reasons: Vec::new(),
            retry_attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record an audit reason without touching status.
    pub fn push_failure_reason(&mut self, reason: impl Into<String>) {
        self.assignment_failure_reasons.push(reason.into());
        self.updated_at = Utc::now();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
