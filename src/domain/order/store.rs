use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::event_sourcing::{Aggregate, EventEnvelope, EventLog, EventLogError};
use crate::notifications::{NoopHook, NotificationHook};
use super::aggregate::Order;
use super::errors::OrderError;
use super::events::{LifecycleEvent, OrderEvent};
use super::value_objects::{ActorId, NewOrder, OrderStatus};

// ============================================================================
// Order Store - canonical table of orders
// ============================================================================
//
// Every row sits behind its own mutex, so transitions on one order are
// serialized while different orders proceed in parallel. The table lock is
// only write-locked to insert. Lock order is always row -> event log.
//
// `apply_transition` is the only way to change an existing row.
//
// Lifecycle events go to the hook before the lock that committed them is
// released, so each order's events are published in commit order.
//
// ============================================================================

pub const ORDER_STREAM: &str = "order-events";

/// Result of a successful write: the committed record and the events logged
/// for it
#[derive(Debug, Clone)]
pub struct Transition {
    pub order: Order,
    pub events: Vec<EventEnvelope<OrderEvent>>,
}

#[derive(Default)]
struct Table {
    rows: HashMap<Uuid, Arc<Mutex<Order>>>,
    // insertion order
    sequence: Vec<Uuid>,
}

pub struct OrderStore {
    table: RwLock<Table>,
    log: EventLog<OrderEvent>,
    schedule_grace: Duration,
    hook: Arc<dyn NotificationHook>,
}

impl OrderStore {
    pub fn new(schedule_grace: Duration) -> Self {
        Self {
            table: RwLock::new(Table::default()),
            log: EventLog::new(ORDER_STREAM),
            schedule_grace,
            hook: Arc::new(NoopHook),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn NotificationHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Validate and insert a new AVAILABLE order
    pub async fn create(
        &self,
        created_by: ActorId,
        request: NewOrder,
        correlation_id: Uuid,
    ) -> Result<Transition, OrderError> {
        let now = Utc::now();
        let event = Order::register(created_by, &request, now, self.schedule_grace)?;

        let mut table = self.table.write().await;

        let id = loop {
            let candidate = Uuid::now_v7();
            if !table.rows.contains_key(&candidate) {
                break candidate;
            }
        };

        let mut order = Order::apply_first_event(id, &event)?;
        order.set_version(1);

        let envelope = EventEnvelope::new(id, 1, event, correlation_id)
            .with_actor(created_by.as_uuid())
            .with_timestamp(order.created_at);

        self.log.append_events(id, 0, vec![envelope.clone()]).await?;

        table.rows.insert(id, Arc::new(Mutex::new(order.clone())));
        table.sequence.push(id);

        // Still holding the table lock: nobody can reach the row yet
        self.publish(&envelope);

        tracing::info!(
            order_id = %id,
            created_by = %created_by,
            address = %order.address,
            price_per_hour = order.price_per_hour,
            "Order created"
        );

        Ok(Transition { order, events: vec![envelope] })
    }

    pub async fn get(&self, id: Uuid) -> Result<Order, OrderError> {
        let row = self.row(id).await?;
        let order = row.lock().await;
        Ok(order.clone())
    }

    /// Orders whose status is in `statuses`, in insertion order
    pub async fn list_by_status(&self, statuses: &[OrderStatus]) -> Vec<Order> {
        self.snapshot()
            .await
            .into_iter()
            .filter(|order| statuses.contains(&order.status))
            .collect()
    }

    /// Every order, in insertion order
    pub async fn snapshot(&self) -> Vec<Order> {
        let rows: Vec<Arc<Mutex<Order>>> = {
            let table = self.table.read().await;
            table
                .sequence
                .iter()
                .filter_map(|id| table.rows.get(id).cloned())
                .collect()
        };

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(row.lock().await.clone());
        }
        orders
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.sequence.len()
    }

    /// Atomic compare-and-swap on an order's status.
    ///
    /// With the row locked: fails with `Conflict` unless the status equals
    /// `expected`, then lets `mutation` decide the events against the current
    /// record. The record is replaced only after the events are logged, so a
    /// failure at any step leaves it untouched.
    pub async fn apply_transition<F>(
        &self,
        id: Uuid,
        expected: OrderStatus,
        correlation_id: Uuid,
        mutation: F,
    ) -> Result<Transition, OrderError>
    where
        F: FnOnce(&Order) -> Result<Vec<OrderEvent>, OrderError>,
    {
        let row = self.row(id).await?;
        let mut current = row.lock().await;

        if current.status != expected {
            return Err(OrderError::Conflict {
                order_id: id,
                expected,
                actual: current.status,
            });
        }

        let events = mutation(&*current)?;
        if events.is_empty() {
            return Err(EventLogError::Empty.into());
        }

        let mut next = current.clone();
        let mut envelopes = Vec::with_capacity(events.len());
        for event in events {
            next.apply_event(&event)?;
            next.set_version(next.version() + 1);
            let actor_id = event.actor_id();
            envelopes.push(
                EventEnvelope::new(id, next.version(), event, correlation_id)
                    .with_actor(actor_id.as_uuid())
                    .with_timestamp(next.updated_at),
            );
        }

        self.log
            .append_events(id, current.version(), envelopes.clone())
            .await?;

        tracing::debug!(
            order_id = %id,
            from_status = %current.status,
            to_status = %next.status,
            version = next.version(),
            "Transition applied"
        );

        *current = next.clone();

        for envelope in &envelopes {
            self.publish(envelope);
        }

        Ok(Transition { order: next, events: envelopes })
    }

    pub fn event_log(&self) -> &EventLog<OrderEvent> {
        &self.log
    }

    /// Rebuild an order from its logged history
    pub async fn replay(&self, id: Uuid) -> anyhow::Result<Order> {
        self.log.load_aggregate::<Order>(id).await
    }

    fn publish(&self, envelope: &EventEnvelope<OrderEvent>) {
        self.hook.publish(LifecycleEvent::from_envelope(envelope));
    }

    async fn row(&self, id: Uuid) -> Result<Arc<Mutex<Order>>, OrderError> {
        let table = self.table.read().await;
        table.rows.get(&id).cloned().ok_or(OrderError::NotFound(id))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::commands::OrderCommand;
    use crate::domain::order::errors::ValidationError;
    use crate::domain::order::value_objects::OrderAction;
    use crate::notifications::hook::testing::RecordingHook;

    fn request(hours_ahead: i64, address: &str) -> NewOrder {
        NewOrder {
            address: address.to_string(),
            date_time: Utc::now() + Duration::hours(hours_ahead),
            cargo_description: "Boxes".to_string(),
            price_per_hour: 450.0,
        }
    }

    fn store() -> OrderStore {
        OrderStore::new(Duration::seconds(5))
    }

    #[tokio::test]
    async fn test_create_assigns_unique_ids() {
        let store = store();
        let dispatcher = ActorId::new();

        let mut ids = std::collections::HashSet::new();
        for i in 0..20 {
            let created = store
                .create(dispatcher, request(1, &format!("Dock {}", i)), Uuid::new_v4())
                .await
                .unwrap();
            assert_eq!(created.order.status, OrderStatus::Available);
            assert_eq!(created.order.version, 1);
            assert!(ids.insert(created.order.id));
        }

        assert_eq!(store.len().await, 20);
        assert_eq!(store.event_log().len().await, 20);
    }

    #[tokio::test]
    async fn test_invalid_create_stores_nothing() {
        let store = store();
        let mut bad = request(1, "Main St 1");
        bad.price_per_hour = -1.0;

        let err = store.create(ActorId::new(), bad, Uuid::new_v4()).await.unwrap_err();

        assert!(matches!(err, OrderError::Validation(ValidationError::NonPositivePrice(_))));
        assert_eq!(store.len().await, 0);
        assert_eq!(store.event_log().len().await, 0);
    }

    #[tokio::test]
    async fn test_get_unknown_order() {
        let id = Uuid::new_v4();
        assert_eq!(store().get(id).await.unwrap_err(), OrderError::NotFound(id));
    }

    #[tokio::test]
    async fn test_list_by_status_keeps_insertion_order() {
        let store = store();
        let dispatcher = ActorId::new();
        let a = store.create(dispatcher, request(5, "A"), Uuid::new_v4()).await.unwrap().order;
        let b = store.create(dispatcher, request(1, "B"), Uuid::new_v4()).await.unwrap().order;
        let c = store.create(dispatcher, request(3, "C"), Uuid::new_v4()).await.unwrap().order;

        let command = OrderCommand::CancelOrder { dispatcher_id: dispatcher };
        store
            .apply_transition(b.id, OrderStatus::Available, Uuid::new_v4(), |o| o.handle_command(&command))
            .await
            .unwrap();

        let available: Vec<Uuid> = store
            .list_by_status(&[OrderStatus::Available])
            .await
            .iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(available, vec![a.id, c.id]);

        let all: Vec<Uuid> = store
            .list_by_status(&[OrderStatus::Available, OrderStatus::Cancelled])
            .await
            .iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(all, vec![a.id, b.id, c.id]);
    }

    #[tokio::test]
    async fn test_status_mismatch_is_conflict_and_mutation_is_skipped() {
        let store = store();
        let order = store.create(ActorId::new(), request(1, "A"), Uuid::new_v4()).await.unwrap().order;

        let mut called = false;
        let err = store
            .apply_transition(order.id, OrderStatus::Taken, Uuid::new_v4(), |_| {
                called = true;
                Ok(Vec::new())
            })
            .await
            .unwrap_err();

        assert!(!called);
        assert_eq!(
            err,
            OrderError::Conflict {
                order_id: order.id,
                expected: OrderStatus::Taken,
                actual: OrderStatus::Available,
            }
        );
        assert_eq!(store.get(order.id).await.unwrap(), order);
    }

    #[tokio::test]
    async fn test_rejected_mutation_leaves_row_untouched() {
        let store = store();
        let order = store.create(ActorId::new(), request(1, "A"), Uuid::new_v4()).await.unwrap().order;

        let stranger = ActorId::new();
        let command = OrderCommand::CancelOrder { dispatcher_id: stranger };
        let err = store
            .apply_transition(order.id, OrderStatus::Available, Uuid::new_v4(), |o| o.handle_command(&command))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::Forbidden { action: OrderAction::Cancel, .. }));
        assert_eq!(store.get(order.id).await.unwrap(), order);
        assert_eq!(store.event_log().load_events(order.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_mutation_without_events_is_an_error() {
        let store = store();
        let order = store.create(ActorId::new(), request(1, "A"), Uuid::new_v4()).await.unwrap().order;

        let err = store
            .apply_transition(order.id, OrderStatus::Available, Uuid::new_v4(), |_| Ok(Vec::new()))
            .await
            .unwrap_err();

        assert_eq!(err, OrderError::EventLog(EventLogError::Empty));
        assert_eq!(store.get(order.id).await.unwrap(), order);
        assert_eq!(store.event_log().len().await, 1);
    }

    #[tokio::test]
    async fn test_committed_events_reach_the_hook() {
        let hook = Arc::new(RecordingHook::new());
        let store = store().with_hook(hook.clone());
        let dispatcher = ActorId::new();
        let order = store.create(dispatcher, request(1, "A"), Uuid::new_v4()).await.unwrap().order;

        let stranger = OrderCommand::CancelOrder { dispatcher_id: ActorId::new() };
        store
            .apply_transition(order.id, OrderStatus::Available, Uuid::new_v4(), |o| o.handle_command(&stranger))
            .await
            .unwrap_err();
        let cancel = OrderCommand::CancelOrder { dispatcher_id: dispatcher };
        store
            .apply_transition(order.id, OrderStatus::Available, Uuid::new_v4(), |o| o.handle_command(&cancel))
            .await
            .unwrap();

        let statuses: Vec<_> = hook.events().iter().map(|e| (e.from_status, e.to_status)).collect();
        assert_eq!(
            statuses,
            vec![
                (None, OrderStatus::Available),
                (Some(OrderStatus::Available), OrderStatus::Cancelled),
            ]
        );
    }

    /// Stalls inside `publish` for creation events
    struct SlowCreationHook {
        inner: RecordingHook,
    }

    impl NotificationHook for SlowCreationHook {
        fn publish(&self, event: LifecycleEvent) {
            if event.from_status.is_none() {
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            self.inner.publish(event);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_claim_racing_a_slow_creation_publish_keeps_event_order() {
        let hook = Arc::new(SlowCreationHook { inner: RecordingHook::new() });
        let store = Arc::new(store().with_hook(hook.clone()));
        let dispatcher = ActorId::new();
        let loader = ActorId::new();

        let creating = {
            let store = store.clone();
            tokio::spawn(async move { store.create(dispatcher, request(1, "A"), Uuid::new_v4()).await })
        };

        // Claim the moment the order becomes visible
        let order_id = loop {
            if let Some(order) = store.list_by_status(&[OrderStatus::Available]).await.first() {
                break order.id;
            }
            tokio::task::yield_now().await;
        };
        let claim = OrderCommand::ClaimOrder { loader_id: loader };
        store
            .apply_transition(order_id, OrderStatus::Available, Uuid::new_v4(), |o| o.handle_command(&claim))
            .await
            .unwrap();
        creating.await.unwrap().unwrap();

        let statuses: Vec<_> = hook.inner.events().iter().map(|e| e.to_status).collect();
        assert_eq!(statuses, vec![OrderStatus::Available, OrderStatus::Taken]);
    }

    #[tokio::test]
    async fn test_transition_bumps_version_and_logs_event() {
        let store = store();
        let order = store.create(ActorId::new(), request(1, "A"), Uuid::new_v4()).await.unwrap().order;
        let loader = ActorId::new();
        let correlation_id = Uuid::new_v4();

        let command = OrderCommand::ClaimOrder { loader_id: loader };
        let transition = store
            .apply_transition(order.id, OrderStatus::Available, correlation_id, |o| o.handle_command(&command))
            .await
            .unwrap();

        assert_eq!(transition.order.version, 2);
        assert_eq!(transition.order.status, OrderStatus::Taken);
        assert_eq!(transition.events.len(), 1);

        let logged = &transition.events[0];
        assert_eq!(logged.sequence_number, 2);
        assert_eq!(logged.event_type, "OrderClaimed");
        assert_eq!(logged.actor_id, Some(loader.as_uuid()));
        assert_eq!(logged.correlation_id, correlation_id);
    }

    #[tokio::test]
    async fn test_replay_matches_canonical_record() {
        let store = store();
        let dispatcher = ActorId::new();
        let loader = ActorId::new();
        let order = store.create(dispatcher, request(2, "A"), Uuid::new_v4()).await.unwrap().order;

        let claim = OrderCommand::ClaimOrder { loader_id: loader };
        store
            .apply_transition(order.id, OrderStatus::Available, Uuid::new_v4(), |o| o.handle_command(&claim))
            .await
            .unwrap();
        let complete = OrderCommand::CompleteOrder { loader_id: loader };
        store
            .apply_transition(order.id, OrderStatus::Taken, Uuid::new_v4(), |o| o.handle_command(&complete))
            .await
            .unwrap();

        let canonical = store.get(order.id).await.unwrap();
        let replayed = store.replay(order.id).await.unwrap();

        assert_eq!(replayed, canonical);
        assert_eq!(replayed.version, 3);
        assert_eq!(replayed.status, OrderStatus::Completed);
    }
}
