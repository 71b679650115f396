//! Field technician types.
//!
//! `is_available` is derived state: `is_active && current_assignments <
//! max_assignments` after every engine-driven mutation. An operator can
//! still force it off ("go offline") independent of capacity; the two
//! notions are deliberately not unified.

use crate::geo::GeoPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default concurrent-order capacity for a field technician.
pub const DEFAULT_MAX_ASSIGNMENTS: u32 = 5;

/// Status of one order on a technician's plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentRecordStatus {
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl AssignmentRecordStatus {
    /// Records in these states count against capacity.
    pub fn counts_against_capacity(&self) -> bool {
        matches!(
            self,
            AssignmentRecordStatus::Assigned | AssignmentRecordStatus::InProgress
        )
    }
}

/// One entry in a technician's assignment ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub order_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub status: AssignmentRecordStatus,
}

/// A field phlebotomist available for home collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Technician {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub location: GeoPoint,
    /// Admin-controlled onboarding/offboarding flag
    pub is_active: bool,
    /// Derived from activity + capacity; operator may also force it off
    pub is_available: bool,
    pub current_assignments: u32,
    pub max_assignments: u32,
    pub assigned_orders: Vec<AssignmentRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Technician {
    pub fn new(name: impl Into<String>, phone: impl Into<String>, location: GeoPoint) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            phone: phone.into(),
            location,
            is_active: true,
            is_available: true,
            current_assignments: 0,
            max_assignments: DEFAULT_MAX_ASSIGNMENTS,
            assigned_orders: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_max_assignments(mut self, max: u32) -> Self {
        self.max_assignments = max;
        self.recompute_availability();
        self
    }

    /// Room for one more order.
    pub fn has_capacity(&self) -> bool {
        self.current_assignments < self.max_assignments
    }

    /// Re-derive `is_available` after a capacity or activity mutation.
    pub fn recompute_availability(&mut self) {
        self.is_available = self.is_active && self.has_capacity();
        self.updated_at = Utc::now();
    }

    /// Count of ledger entries that should equal `current_assignments`.
    pub fn open_ledger_count(&self) -> u32 {
        self.assigned_orders
            .iter()
            .filter(|r| r.status.counts_against_capacity())
            .count() as u32
    }

    /// Both structural invariants hold.
    pub fn invariants_hold(&self) -> bool {
        self.current_assignments == self.open_ledger_count()
            && (!self.is_available || (self.is_active && self.has_capacity()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tech() -> Technician {
        Technician::new("Asha", "+91-9000000001", GeoPoint::new(12.97, 77.59))
    }

    #[test]
    fn test_new_technician_available() {
        let t = tech();
        assert!(t.is_active);
        assert!(t.is_available);
        assert_eq!(t.max_assignments, DEFAULT_MAX_ASSIGNMENTS);
        assert!(t.invariants_hold());
    }

    #[test]
    fn test_availability_recompute_at_capacity() {
        let mut t = tech().with_max_assignments(1);
        t.current_assignments = 1;
        t.assigned_orders.push(AssignmentRecord {
            order_id: Uuid::new_v4(),
            assigned_at: Utc::now(),
            status: AssignmentRecordStatus::Assigned,
        });
        t.recompute_availability();
        assert!(!t.is_available);
        assert!(t.invariants_hold());
    }

    #[test]
    fn test_inactive_never_available() {
        let mut t = tech();
        t.is_active = false;
        t.recompute_availability();
        assert!(!t.is_available);
    }

    #[test]
    fn test_completed_records_free_capacity() {
        let mut t = tech();
        t.assigned_orders.push(AssignmentRecord {
            order_id: Uuid::new_v4(),
            assigned_at: Utc::now(),
            status: AssignmentRecordStatus::Completed,
        });
        assert_eq!(t.open_ledger_count(), 0);
    }
}
