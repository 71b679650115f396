//! Order persistence boundary.
//!
//! The engine persists order state through this trait only. The durable
//! backend belongs to the surrounding application; `MemoryOrderStore`
//! backs tests, the demo CLI, and single-process deployments.

use async_trait::async_trait;
use phlebo_core::{DispatchError, Order, OrderStatus, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Async persistence contract for orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new order. Overwrites nothing; duplicate ids are a
    /// storage failure.
    async fn insert(&self, order: Order) -> Result<()>;

    /// Fetch one order by id.
    async fn get(&self, order_id: Uuid) -> Result<Order>;

    /// Persist the full order state. The single assignment task owning
    /// the order is the only writer of its assignment fields.
    async fn update(&self, order: Order) -> Result<()>;

    /// Orders waiting on the operator console.
    async fn manual_queue(&self) -> Result<Vec<Order>>;
}

/// In-memory store over a `tokio` read-write lock.
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(DispatchError::Storage(format!(
                "duplicate order id {}",
                order.id
            )));
        }
        orders.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, order_id: Uuid) -> Result<Order> {
        self.orders
            .read()
            .await
            .get(&order_id)
            .cloned()
            .ok_or(DispatchError::OrderNotFound(order_id))
    }

    async fn update(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        if !orders.contains_key(&order.id) {
            return Err(DispatchError::OrderNotFound(order.id));
        }
        orders.insert(order.id, order);
        Ok(())
    }

    async fn manual_queue(&self) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut queue: Vec<Order> = orders
            .values()
            .filter(|o| o.status == OrderStatus::ManualAssignmentRequired)
            .cloned()
            .collect();
        queue.sort_by_key(|o| o.created_at);
        Ok(queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phlebo_core::GeoPoint;

    fn order() -> Order {
        Order::new(Uuid::new_v4(), Some(GeoPoint::new(12.97, 77.59)))
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryOrderStore::new();
        let o = order();
        let id = o.id;
        store.insert(o).await.expect("insert");
        let fetched = store.get(id).await.expect("get");
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.status, OrderStatus::Created);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = MemoryOrderStore::new();
        let o = order();
        store.insert(o.clone()).await.expect("insert");
        assert!(store.insert(o).await.is_err());
    }

    #[tokio::test]
    async fn test_update_missing_order() {
        let store = MemoryOrderStore::new();
        assert!(matches!(
            store.update(order()).await,
            Err(DispatchError::OrderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_manual_queue_filters_and_orders() {
        let store = MemoryOrderStore::new();
        let mut a = order();
        a.status = OrderStatus::ManualAssignmentRequired;
        let mut b = order();
        b.status = OrderStatus::Assigned;
        let mut c = order();
        c.status = OrderStatus::ManualAssignmentRequired;
        c.created_at = a.created_at + chrono::Duration::seconds(5);
        let first = a.id;
        store.insert(a).await.expect("insert a");
        store.insert(b).await.expect("insert b");
        store.insert(c).await.expect("insert c");

        let queue = store.manual_queue().await.expect("queue");
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].id, first);
    }
}
