//! Assignment outcome types.
//!
//! The engine returns a value describing what happened; side effects are
//! derived from it by the dispatcher. This keeps the decision path
//! testable without mocking any network boundary.

use chrono::{DateTime, Utc};
use phlebo_core::{Incentive, Order, StrategyKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit record of one tier's attempt during a cascade run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentAttempt {
    pub strategy: StrategyKind,
    /// Outer search radius; `None` for the unbounded tiers
    pub radius_km: Option<f64>,
    pub candidate_found: bool,
    /// The claimed technician, or the tier's top candidate when every
    /// claim in the tier lost its race
    pub candidate_staff_id: Option<Uuid>,
    pub claimed: bool,
}

/// Terminal decision for one assignment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AssignmentDecision {
    Assigned {
        staff_id: Uuid,
        strategy: StrategyKind,
        /// Rounded to 2 decimal places
        distance_km: f64,
        estimated_arrival: DateTime<Utc>,
        incentive: Incentive,
    },
    Escalated {
        reasons: Vec<String>,
    },
}

/// What the engine did with an order, with the full attempt trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentOutcome {
    pub order: Order,
    pub decision: AssignmentDecision,
    pub attempts: Vec<AssignmentAttempt>,
}

impl AssignmentOutcome {
    pub fn escalated(order: Order, attempts: Vec<AssignmentAttempt>) -> Self {
        let reasons = order.assignment_failure_reasons.clone();
        Self {
            order,
            decision: AssignmentDecision::Escalated { reasons },
            attempts,
        }
    }

    pub fn is_assigned(&self) -> bool {
        matches!(self.decision, AssignmentDecision::Assigned { .. })
    }

    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self.decision {
            AssignmentDecision::Assigned { .. } => "assigned",
            AssignmentDecision::Escalated { .. } => "escalated",
        }
    }
}
