//! Escalation to the operator console.
//!
//! The terminal fallback when every automatic tier is exhausted. The
//! order lands in `manual_assignment_required` with its full failure
//! audit trail, and the on-call operator gets a high-urgency alert.

use phlebo_core::{Order, OrderStatus, Result};
use phlebo_notify::{DispatchEvent, NotificationDispatcher};
use phlebo_store::OrderStore;
use std::sync::Arc;
use tracing::warn;

pub struct EscalationHandler {
    store: Arc<dyn OrderStore>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl EscalationHandler {
    pub fn new(store: Arc<dyn OrderStore>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Park the order for manual assignment.
    ///
    /// Idempotent: re-escalating an already-parked order appends to the
    /// audit trail and bumps the retry counter, but does not alert the
    /// operator a second time.
    pub async fn escalate(&self, mut order: Order, reasons: Vec<String>) -> Result<Order> {
        let first_escalation = order.status != OrderStatus::ManualAssignmentRequired;

        for reason in &reasons {
            order.push_failure_reason(reason.clone());
        }
        order.retry_attempts += 1;
        order.status = OrderStatus::ManualAssignmentRequired;
        order.touch();
        self.store.update(order.clone()).await?;

        warn!(
            order_id = %order.id,
            retry_attempts = order.retry_attempts,
            reasons = ?reasons,
            "order escalated for manual assignment"
        );

        if first_escalation {
            self.dispatcher
                .notify_operator_escalation(&order, &order.assignment_failure_reasons)
                .await;
            self.dispatcher
                .publish(DispatchEvent::AssignmentEscalated {
                    order_id: order.id,
                    reasons: order.assignment_failure_reasons.clone(),
                })
                .await;
        }

        Ok(order)
    }
}
