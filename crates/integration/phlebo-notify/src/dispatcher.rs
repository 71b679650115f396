//! Assignment-outcome fan-out.
//!
//! The engine calls these after the order's state transition is already
//! persisted. Every call is fire-and-forget: a delivery or publish
//! failure is warn!-logged and swallowed, never surfaced as an
//! assignment failure.

use crate::events::{DispatchEvent, EventBus};
use crate::notifier::{Notification, Notifier, Recipient, TemplateKind};
use phlebo_core::{Incentive, Order, StrategyKind, Technician};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Thin side-effect layer over the Notifier and the event bus.
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    bus: Arc<dyn EventBus>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, bus: Arc<dyn EventBus>) -> Self {
        Self { notifier, bus }
    }

    /// Tell the patient who is coming and when.
    pub async fn notify_patient_assigned(
        &self,
        order: &Order,
        staff: &Technician,
        strategy: StrategyKind,
        distance_km: f64,
    ) {
        self.deliver(Notification {
            recipient: Recipient::Patient(order.patient_id),
            template: TemplateKind::PatientAssigned,
            payload: json!({
                "order_id": order.id,
                "staff_name": staff.name,
                "staff_phone": staff.phone,
                "strategy": strategy,
                "distance_km": distance_km,
                "estimated_arrival": order.assigned_staff.as_ref().map(|a| a.estimated_arrival),
            }),
        })
        .await;
    }

    /// Tell the technician about the pickup, plus the allowance/bonus
    /// detail when a fallback tier earned one.
    pub async fn notify_staff_assigned(
        &self,
        staff: &Technician,
        order: &Order,
        distance_km: f64,
        strategy: StrategyKind,
        incentive: &Incentive,
    ) {
        self.deliver(Notification {
            recipient: Recipient::Staff(staff.id),
            template: TemplateKind::StaffAssigned,
            payload: json!({
                "order_id": order.id,
                "collection_location": order.collection_location,
                "distance_km": distance_km,
                "strategy": strategy,
            }),
        })
        .await;

        if !incentive.is_none() {
            self.deliver(Notification {
                recipient: Recipient::Staff(staff.id),
                template: TemplateKind::StaffIncentive,
                payload: json!({
                    "order_id": order.id,
                    "incentive": incentive,
                }),
            })
            .await;
        }
    }

    /// High-urgency operator alert: the cascade gave up on this order.
    pub async fn notify_operator_escalation(&self, order: &Order, failed_reasons: &[String]) {
        self.deliver(Notification {
            recipient: Recipient::Operations,
            template: TemplateKind::OperatorEscalation,
            payload: json!({
                "order_id": order.id,
                "patient_id": order.patient_id,
                "retry_attempts": order.retry_attempts,
                "failed_reasons": failed_reasons,
            }),
        })
        .await;
    }

    /// Critical operator alert: the engine itself failed unexpectedly.
    pub async fn notify_assignment_error(&self, order_id: Uuid, error: &str) {
        self.deliver(Notification {
            recipient: Recipient::Operations,
            template: TemplateKind::OperatorError,
            payload: json!({
                "order_id": order_id,
                "error": error,
            }),
        })
        .await;
    }

    /// Publish a terminal-outcome event. At-least-once; failures logged.
    pub async fn publish(&self, event: DispatchEvent) {
        if let Err(e) = self.bus.publish(event.clone()).await {
            warn!(
                event_type = event.event_type(),
                order_id = %event.order_id(),
                error = %e,
                "event publish failed"
            );
        }
    }

    async fn deliver(&self, notification: Notification) {
        let template = notification.template;
        let recipient = notification.recipient;
        if let Err(e) = self.notifier.deliver(notification).await {
            warn!(
                template = ?template,
                recipient = ?recipient,
                error = %e,
                "notification delivery failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEventBus;
    use crate::notifier::{NullNotifier, RecordingNotifier};
    use async_trait::async_trait;
    use phlebo_core::GeoPoint;

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn deliver(&self, _notification: Notification) -> anyhow::Result<()> {
            anyhow::bail!("smtp down")
        }
    }

    fn fixtures() -> (Order, Technician) {
        let order = Order::new(Uuid::new_v4(), Some(GeoPoint::new(12.97, 77.59)));
        let staff = Technician::new("Meena", "+91-9000000003", GeoPoint::new(12.95, 77.60));
        (order, staff)
    }

    #[tokio::test]
    async fn test_incentive_message_only_for_fallback_tiers() {
        let notifier = RecordingNotifier::new();
        let bus = RecordingEventBus::new();
        let dispatcher = NotificationDispatcher::new(notifier.clone(), bus);
        let (order, staff) = fixtures();

        dispatcher
            .notify_staff_assigned(&staff, &order, 3.0, StrategyKind::Nearby, &Incentive::None)
            .await;
        assert_eq!(notifier.delivered().await.len(), 1);

        dispatcher
            .notify_staff_assigned(
                &staff,
                &order,
                18.0,
                StrategyKind::Extended,
                &Incentive::TravelAllowance { rupees: 90.0 },
            )
            .await;
        let delivered = notifier.delivered().await;
        assert_eq!(delivered.len(), 3);
        assert_eq!(delivered[2].template, TemplateKind::StaffIncentive);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed() {
        let bus = RecordingEventBus::new();
        let dispatcher = NotificationDispatcher::new(Arc::new(FailingNotifier), bus);
        let (order, staff) = fixtures();

        // Must not panic or propagate
        dispatcher
            .notify_patient_assigned(&order, &staff, StrategyKind::Nearby, 3.0)
            .await;
        dispatcher
            .notify_operator_escalation(&order, &["no candidates".to_string()])
            .await;
    }

    #[tokio::test]
    async fn test_publish_reaches_bus() {
        let bus = RecordingEventBus::new();
        let dispatcher =
            NotificationDispatcher::new(Arc::new(NullNotifier), bus.clone());
        let order_id = Uuid::new_v4();

        dispatcher
            .publish(DispatchEvent::AssignmentError {
                order_id,
                error: "deadline exceeded".to_string(),
            })
            .await;

        let published = bus.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].event_type(), "assignment.error");
    }
}
