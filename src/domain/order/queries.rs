use std::sync::Arc;

use super::aggregate::Order;
use super::store::OrderStore;
use super::value_objects::{ActorId, OrderStatus};

// ============================================================================
// Order Queries - read projections for the app screens
// ============================================================================
//
// Recomputed from a store snapshot on every call. A view reflects every
// transition committed before the snapshot was taken.
//
// ============================================================================

pub struct OrderQueries {
    store: Arc<OrderStore>,
}

impl OrderQueries {
    pub fn new(store: Arc<OrderStore>) -> Self {
        Self { store }
    }

    /// Open orders a loader can take, soonest first
    pub async fn available(&self) -> Vec<Order> {
        let mut orders = self.store.list_by_status(&[OrderStatus::Available]).await;
        // stable: equal times keep insertion order
        orders.sort_by_key(|order| order.date_time);
        orders
    }

    /// Orders assigned to `actor`, any status
    pub async fn mine(&self, actor: ActorId) -> Vec<Order> {
        self.filtered(|order| order.assignee == Some(actor)).await
    }

    pub async fn created_by_me(&self, actor: ActorId) -> Vec<Order> {
        self.filtered(|order| order.created_by == actor).await
    }

    /// Finished orders `actor` worked on or created, latest first
    pub async fn history(&self, actor: ActorId) -> Vec<Order> {
        let mut orders = self
            .filtered(|order| {
                order.status.is_terminal()
                    && (order.assignee == Some(actor) || order.created_by == actor)
            })
            .await;
        orders.sort_by(|a, b| b.date_time.cmp(&a.date_time));
        orders
    }

    async fn filtered<P>(&self, predicate: P) -> Vec<Order>
    where
        P: Fn(&Order) -> bool,
    {
        self.store
            .snapshot()
            .await
            .into_iter()
            .filter(|order| predicate(order))
            .collect()
    }
}
