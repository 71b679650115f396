//! Technician registry.
//!
//! Owns the only hot shared mutable state in the system: each
//! technician's load/availability pair. All mutation funnels through
//! `try_claim` / `release` / `update_availability`; no other component
//! writes these fields.
//!
//! `try_claim` is the atomic heart of dispatch: the capacity check, the
//! increment, the ledger append and the availability recompute happen
//! under one write-lock acquisition, so two orders racing for the last
//! slot on a technician can never both win.

use async_trait::async_trait;
use chrono::Utc;
use phlebo_core::{
    AssignmentRecord, AssignmentRecordStatus, DispatchError, Result, Technician,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Outcome of a claim attempt.
///
/// `Rejected` is a soft miss, the normal "someone else took this slot"
/// result, and callers move on to the next candidate, never abort.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    Claimed { technician: Technician },
    Rejected { reason: String },
}

impl ClaimOutcome {
    pub fn is_claimed(&self) -> bool {
        matches!(self, ClaimOutcome::Claimed { .. })
    }
}

/// Registry contract consumed by the engine, the geo index and the
/// operator console.
#[async_trait]
pub trait StaffRegistry: Send + Sync {
    /// Atomically reserve one unit of capacity for an order.
    ///
    /// Gate: `is_active && current_assignments < max_assignments`. The
    /// availability flag is deliberately not part of the gate: the
    /// least-busy tier claims staff an operator marked offline, and the
    /// flag is recomputed from capacity after the increment.
    async fn try_claim(&self, staff_id: Uuid, order_id: Uuid) -> Result<ClaimOutcome>;

    /// Close out a ledger entry on order completion or cancellation,
    /// freeing one unit of capacity.
    async fn release(
        &self,
        staff_id: Uuid,
        order_id: Uuid,
        final_status: AssignmentRecordStatus,
    ) -> Result<Technician>;

    /// Flip an open ledger entry to in-progress when the technician
    /// starts travelling. Capacity is unchanged.
    async fn mark_in_progress(&self, staff_id: Uuid, order_id: Uuid) -> Result<Technician>;

    /// Operator override ("go offline" / "come back"). Does not touch
    /// `current_assignments`.
    async fn update_availability(&self, staff_id: Uuid, available: bool) -> Result<Technician>;

    /// Insert or replace a technician record (operator onboarding).
    async fn upsert(&self, technician: Technician) -> Result<()>;

    async fn get(&self, staff_id: Uuid) -> Result<Technician>;

    /// One internally-consistent snapshot of every technician. Geo
    /// queries read exactly one snapshot each.
    async fn snapshot(&self) -> Result<Vec<Technician>>;
}

/// In-memory registry guarded by a single `tokio` read-write lock.
///
/// The write lock makes every mutating operation a serialized
/// read-modify-write, which is the whole point.
#[derive(Default)]
pub struct MemoryStaffRegistry {
    staff: RwLock<HashMap<Uuid, Technician>>,
}

impl MemoryStaffRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl StaffRegistry for MemoryStaffRegistry {
    async fn try_claim(&self, staff_id: Uuid, order_id: Uuid) -> Result<ClaimOutcome> {
        let mut staff = self.staff.write().await;
        let tech = staff
            .get_mut(&staff_id)
            .ok_or(DispatchError::StaffNotFound(staff_id))?;

        if !tech.is_active {
            return Ok(ClaimOutcome::Rejected {
                reason: format!("technician {} is inactive", staff_id),
            });
        }
        if !tech.has_capacity() {
            return Ok(ClaimOutcome::Rejected {
                reason: format!(
                    "technician {} at capacity {}/{}",
                    staff_id, tech.current_assignments, tech.max_assignments
                ),
            });
        }

        tech.current_assignments += 1;
        tech.assigned_orders.push(AssignmentRecord {
            order_id,
            assigned_at: Utc::now(),
            status: AssignmentRecordStatus::Assigned,
        });
        tech.recompute_availability();

        debug!(
            staff_id = %staff_id,
            order_id = %order_id,
            load = tech.current_assignments,
            "claimed technician slot"
        );
        Ok(ClaimOutcome::Claimed {
            technician: tech.clone(),
        })
    }

    async fn release(
        &self,
        staff_id: Uuid,
        order_id: Uuid,
        final_status: AssignmentRecordStatus,
    ) -> Result<Technician> {
        let mut staff = self.staff.write().await;
        let tech = staff
            .get_mut(&staff_id)
            .ok_or(DispatchError::StaffNotFound(staff_id))?;

        let record = tech
            .assigned_orders
            .iter_mut()
            .find(|r| r.order_id == order_id && r.status.counts_against_capacity())
            .ok_or(DispatchError::OrderNotFound(order_id))?;

        record.status = final_status;
        if !final_status.counts_against_capacity() {
            tech.current_assignments = tech.current_assignments.saturating_sub(1);
        }
        tech.recompute_availability();

        debug!(
            staff_id = %staff_id,
            order_id = %order_id,
            load = tech.current_assignments,
            "released technician slot"
        );
        Ok(tech.clone())
    }

    async fn mark_in_progress(&self, staff_id: Uuid, order_id: Uuid) -> Result<Technician> {
        let mut staff = self.staff.write().await;
        let tech = staff
            .get_mut(&staff_id)
            .ok_or(DispatchError::StaffNotFound(staff_id))?;

        let record = tech
            .assigned_orders
            .iter_mut()
            .find(|r| r.order_id == order_id && r.status == AssignmentRecordStatus::Assigned)
            .ok_or(DispatchError::OrderNotFound(order_id))?;
        record.status = AssignmentRecordStatus::InProgress;
        tech.updated_at = Utc::now();
        Ok(tech.clone())
    }

    async fn update_availability(&self, staff_id: Uuid, available: bool) -> Result<Technician> {
        let mut staff = self.staff.write().await;
        let tech = staff
            .get_mut(&staff_id)
            .ok_or(DispatchError::StaffNotFound(staff_id))?;
        tech.is_available = available;
        tech.updated_at = Utc::now();
        Ok(tech.clone())
    }

    async fn upsert(&self, technician: Technician) -> Result<()> {
        self.staff.write().await.insert(technician.id, technician);
        Ok(())
    }

    async fn get(&self, staff_id: Uuid) -> Result<Technician> {
        self.staff
            .read()
            .await
            .get(&staff_id)
            .cloned()
            .ok_or(DispatchError::StaffNotFound(staff_id))
    }

    async fn snapshot(&self) -> Result<Vec<Technician>> {
        Ok(self.staff.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phlebo_core::GeoPoint;

    async fn registry_with(tech: Technician) -> (Arc<MemoryStaffRegistry>, Uuid) {
        let registry = MemoryStaffRegistry::new();
        let id = tech.id;
        registry.upsert(tech).await.expect("upsert");
        (registry, id)
    }

    fn tech() -> Technician {
        Technician::new("Ravi", "+91-9000000002", GeoPoint::new(12.97, 77.59))
    }

    #[tokio::test]
    async fn test_claim_increments_and_appends() {
        let (registry, id) = registry_with(tech()).await;
        let order_id = Uuid::new_v4();

        let outcome = registry.try_claim(id, order_id).await.expect("claim");
        let claimed = match outcome {
            ClaimOutcome::Claimed { technician } => technician,
            ClaimOutcome::Rejected { reason } => panic!("rejected: {}", reason),
        };
        assert_eq!(claimed.current_assignments, 1);
        assert_eq!(claimed.assigned_orders.len(), 1);
        assert!(claimed.invariants_hold());
    }

    #[tokio::test]
    async fn test_claim_rejected_at_capacity() {
        let (registry, id) = registry_with(tech().with_max_assignments(1)).await;
        assert!(registry
            .try_claim(id, Uuid::new_v4())
            .await
            .expect("first claim")
            .is_claimed());

        let second = registry.try_claim(id, Uuid::new_v4()).await.expect("second");
        assert!(!second.is_claimed());
    }

    #[tokio::test]
    async fn test_claim_rejected_for_inactive() {
        let mut t = tech();
        t.is_active = false;
        t.recompute_availability();
        let (registry, id) = registry_with(t).await;

        let outcome = registry.try_claim(id, Uuid::new_v4()).await.expect("claim");
        assert!(!outcome.is_claimed());
    }

    #[tokio::test]
    async fn test_claim_ignores_operator_offline_flag() {
        // An operator "go offline" does not gate the claim itself; the
        // least-busy tier relies on this.
        let (registry, id) = registry_with(tech()).await;
        registry.update_availability(id, false).await.expect("offline");

        let outcome = registry.try_claim(id, Uuid::new_v4()).await.expect("claim");
        assert!(outcome.is_claimed());
    }

    #[tokio::test]
    async fn test_release_restores_availability() {
        let (registry, id) = registry_with(tech().with_max_assignments(1)).await;
        let order_id = Uuid::new_v4();
        registry.try_claim(id, order_id).await.expect("claim");
        assert!(!registry.get(id).await.expect("get").is_available);

        let after = registry
            .release(id, order_id, AssignmentRecordStatus::Completed)
            .await
            .expect("release");
        assert_eq!(after.current_assignments, 0);
        assert!(after.is_available);
        assert!(after.invariants_hold());
    }

    #[tokio::test]
    async fn test_release_unknown_order() {
        let (registry, id) = registry_with(tech()).await;
        let err = registry
            .release(id, Uuid::new_v4(), AssignmentRecordStatus::Cancelled)
            .await;
        assert!(matches!(err, Err(DispatchError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_mark_in_progress_keeps_capacity() {
        let (registry, id) = registry_with(tech()).await;
        let order_id = Uuid::new_v4();
        registry.try_claim(id, order_id).await.expect("claim");

        let after = registry.mark_in_progress(id, order_id).await.expect("mark");
        assert_eq!(after.current_assignments, 1);
        assert_eq!(
            after.assigned_orders[0].status,
            AssignmentRecordStatus::InProgress
        );
        assert!(after.invariants_hold());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_claims_for_last_slot() {
        let mut t = tech().with_max_assignments(1);
        t.current_assignments = 0;
        let (registry, id) = registry_with(t).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry.try_claim(id, Uuid::new_v4()).await.expect("claim")
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.expect("join").is_claimed() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);

        let tech = registry.get(id).await.expect("get");
        assert_eq!(tech.current_assignments, 1);
        assert!(tech.current_assignments <= tech.max_assignments);
        assert!(tech.invariants_hold());
    }
}
