//! Outbound message boundary.
//!
//! The core hands the Notifier a recipient, a template kind and a
//! structured payload; rendering and delivery (email, push, SMS) belong
//! to the collaborator behind the trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Who a message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    Patient(Uuid),
    Staff(Uuid),
    /// The on-call operations channel, not a single person
    Operations,
}

/// Message template selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    PatientAssigned,
    StaffAssigned,
    /// Allowance/bonus detail for extended, city-wide and least-busy pickups
    StaffIncentive,
    /// Cascade exhausted; operator must assign by hand
    OperatorEscalation,
    /// Unexpected engine failure, distinct from an ordinary escalation
    OperatorError,
}

/// Delivery urgency, routed to different channels by the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Normal,
    High,
    Critical,
}

impl TemplateKind {
    pub fn urgency(&self) -> Urgency {
        match self {
            TemplateKind::PatientAssigned
            | TemplateKind::StaffAssigned
            | TemplateKind::StaffIncentive => Urgency::Normal,
            TemplateKind::OperatorEscalation => Urgency::High,
            TemplateKind::OperatorError => Urgency::Critical,
        }
    }
}

/// One message handed to the Notifier collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: Recipient,
    pub template: TemplateKind,
    pub payload: serde_json::Value,
}

/// Delivery contract. Implementations perform delivery asynchronously
/// and own their own retry policy; the dispatcher logs failures and
/// never propagates them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, notification: Notification) -> anyhow::Result<()>;
}

/// Logs every message at info level. The default for single-process
/// deployments and the demo CLI.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notification: Notification) -> anyhow::Result<()> {
        info!(
            recipient = ?notification.recipient,
            template = ?notification.template,
            urgency = ?notification.template.urgency(),
            payload = %notification.payload,
            "notification"
        );
        Ok(())
    }
}

/// Discards everything.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn deliver(&self, _notification: Notification) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Captures messages for assertions in tests.
#[derive(Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, notification: Notification) -> anyhow::Result<()> {
        self.delivered.lock().await.push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_tiers() {
        assert_eq!(TemplateKind::PatientAssigned.urgency(), Urgency::Normal);
        assert_eq!(TemplateKind::OperatorEscalation.urgency(), Urgency::High);
        assert_eq!(TemplateKind::OperatorError.urgency(), Urgency::Critical);
        assert!(TemplateKind::OperatorError.urgency() > TemplateKind::OperatorEscalation.urgency());
    }

    #[tokio::test]
    async fn test_recording_notifier_captures() {
        let notifier = RecordingNotifier::new();
        notifier
            .deliver(Notification {
                recipient: Recipient::Operations,
                template: TemplateKind::OperatorEscalation,
                payload: serde_json::json!({ "order_id": "x" }),
            })
            .await
            .expect("deliver");

        let delivered = notifier.delivered().await;
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].template, TemplateKind::OperatorEscalation);
    }
}
