//! Outbound event bus.
//!
//! One event per terminal assignment outcome. Publish is at-least-once;
//! consumers de-duplicate on (order_id, event type).

use async_trait::async_trait;
use phlebo_core::StrategyKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Terminal-outcome events consumed by analytics and ops tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DispatchEvent {
    #[serde(rename = "staff.assigned")]
    StaffAssigned {
        order_id: Uuid,
        staff_id: Uuid,
        strategy: StrategyKind,
        distance_km: f64,
    },
    #[serde(rename = "assignment.escalated")]
    AssignmentEscalated {
        order_id: Uuid,
        reasons: Vec<String>,
    },
    #[serde(rename = "assignment.error")]
    AssignmentError { order_id: Uuid, error: String },
}

impl DispatchEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DispatchEvent::StaffAssigned { .. } => "staff.assigned",
            DispatchEvent::AssignmentEscalated { .. } => "assignment.escalated",
            DispatchEvent::AssignmentError { .. } => "assignment.error",
        }
    }

    pub fn order_id(&self) -> Uuid {
        match self {
            DispatchEvent::StaffAssigned { order_id, .. }
            | DispatchEvent::AssignmentEscalated { order_id, .. }
            | DispatchEvent::AssignmentError { order_id, .. } => *order_id,
        }
    }
}

/// Publish contract toward the surrounding application's bus.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: DispatchEvent) -> anyhow::Result<()>;
}

/// Logs events at info level.
pub struct LogEventBus;

#[async_trait]
impl EventBus for LogEventBus {
    async fn publish(&self, event: DispatchEvent) -> anyhow::Result<()> {
        info!(event_type = event.event_type(), order_id = %event.order_id(), "event published");
        Ok(())
    }
}

/// Captures events for assertions in tests.
#[derive(Default)]
pub struct RecordingEventBus {
    published: Mutex<Vec<DispatchEvent>>,
}

impl RecordingEventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn published(&self) -> Vec<DispatchEvent> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl EventBus for RecordingEventBus {
    async fn publish(&self, event: DispatchEvent) -> anyhow::Result<()> {
        self.published.lock().await.push(event);
        Ok(())
    }
}
