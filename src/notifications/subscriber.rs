use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::domain::order::{LifecycleEvent, OrderStatus};

// ============================================================================
// Event Subscriber - idempotent consumer side of the broadcast sink
// ============================================================================
//
// Delivery is at-least-once, and events for one order arrive in commit order.
// An event is a repeat when its order already reached that stage or a later
// one.
//
// Only orders still in progress are tracked by status. Finished orders move
// to a bounded window, so memory stays flat however many orders pass through.
//
// ============================================================================

pub const DEFAULT_FINISHED_WINDOW: usize = 4096;

pub struct EventSubscriber {
    receiver: broadcast::Receiver<LifecycleEvent>,
    in_progress: HashMap<Uuid, OrderStatus>,
    finished: HashSet<Uuid>,
    finished_order: VecDeque<Uuid>,
    finished_window: usize,
}

/// Position in the lifecycle; a repeat never moves forward
fn stage(status: OrderStatus) -> u8 {
    match status {
        OrderStatus::Available => 0,
        OrderStatus::Taken => 1,
        OrderStatus::Completed | OrderStatus::Cancelled => 2,
    }
}

impl EventSubscriber {
    pub fn new(receiver: broadcast::Receiver<LifecycleEvent>, finished_window: usize) -> Self {
        Self {
            receiver,
            in_progress: HashMap::new(),
            finished: HashSet::new(),
            finished_order: VecDeque::new(),
            finished_window: finished_window.max(1),
        }
    }

    /// Next event not seen before; `None` once the channel is closed
    pub async fn next(&mut self) -> Option<LifecycleEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.accept(&event) {
                        return Some(event);
                    }
                    tracing::debug!(
                        order_id = %event.order_id,
                        to_status = %event.to_status,
                        "Duplicate lifecycle event skipped"
                    );
                }
                Err(RecvError::Lagged(missed)) => {
                    // Missed events are recovered by re-querying the order views
                    tracing::warn!(missed = missed, "Subscriber lagged behind lifecycle events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn accept(&mut self, event: &LifecycleEvent) -> bool {
        if self.finished.contains(&event.order_id) {
            return false;
        }
        if let Some(&reached) = self.in_progress.get(&event.order_id) {
            if stage(event.to_status) <= stage(reached) {
                return false;
            }
        }

        if event.to_status.is_terminal() {
            self.in_progress.remove(&event.order_id);
            self.finish(event.order_id);
        } else {
            self.in_progress.insert(event.order_id, event.to_status);
        }
        true
    }

    fn finish(&mut self, order_id: Uuid) {
        if self.finished_order.len() == self.finished_window {
            if let Some(oldest) = self.finished_order.pop_front() {
                self.finished.remove(&oldest);
            }
        }
        self.finished.insert(order_id);
        self.finished_order.push_back(order_id);
    }

    #[cfg(test)]
    fn tracked_orders(&self) -> usize {
        self.in_progress.len() + self.finished.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::ActorId;
    use chrono::Utc;

    fn event(order_id: Uuid, to_status: OrderStatus) -> LifecycleEvent {
        LifecycleEvent {
            order_id,
            from_status: None,
            to_status,
            actor_id: ActorId::new(),
            timestamp: Utc::now(),
        }
    }

    async fn drain(subscriber: &mut EventSubscriber) -> Vec<LifecycleEvent> {
        let mut received = Vec::new();
        while let Some(event) = subscriber.next().await {
            received.push(event);
        }
        received
    }

    #[tokio::test]
    async fn test_duplicates_are_skipped() {
        let (tx, rx) = broadcast::channel(16);
        let mut subscriber = EventSubscriber::new(rx, DEFAULT_FINISHED_WINDOW);
        let order_id = Uuid::new_v4();

        let available = event(order_id, OrderStatus::Available);
        let taken = event(order_id, OrderStatus::Taken);
        let completed = event(order_id, OrderStatus::Completed);
        tx.send(available.clone()).unwrap();
        tx.send(available.clone()).unwrap();
        tx.send(taken.clone()).unwrap();
        // late redelivery of an earlier stage
        tx.send(available.clone()).unwrap();
        tx.send(completed.clone()).unwrap();
        tx.send(completed.clone()).unwrap();
        drop(tx);

        assert_eq!(drain(&mut subscriber).await, vec![available, taken, completed]);
    }

    #[tokio::test]
    async fn test_finished_orders_do_not_accumulate() {
        let (tx, rx) = broadcast::channel(1024);
        let mut subscriber = EventSubscriber::new(rx, 8);

        let orders: Vec<Uuid> = (0..100).map(|_| Uuid::new_v4()).collect();
        for &order_id in &orders {
            tx.send(event(order_id, OrderStatus::Available)).unwrap();
            tx.send(event(order_id, OrderStatus::Cancelled)).unwrap();
        }
        let open = Uuid::new_v4();
        tx.send(event(open, OrderStatus::Available)).unwrap();
        // still inside the window
        tx.send(event(orders[99], OrderStatus::Cancelled)).unwrap();
        drop(tx);

        let received = drain(&mut subscriber).await;
        assert_eq!(received.len(), 201);
        assert_eq!(received.last().map(|e| e.order_id), Some(open));
        assert_eq!(subscriber.tracked_orders(), 9);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_keeps_receiving() {
        let (tx, rx) = broadcast::channel(2);
        let mut subscriber = EventSubscriber::new(rx, DEFAULT_FINISHED_WINDOW);

        for _ in 0..4 {
            tx.send(event(Uuid::new_v4(), OrderStatus::Available)).unwrap();
        }
        let last = event(Uuid::new_v4(), OrderStatus::Cancelled);
        tx.send(last.clone()).unwrap();
        drop(tx);

        let received = drain(&mut subscriber).await;
        assert_eq!(received.len(), 2);
        assert_eq!(received.last(), Some(&last));
    }
}
