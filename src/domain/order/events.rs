use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::event_sourcing::{DomainEvent, EventEnvelope};
use super::value_objects::{ActorId, OrderStatus};

// ============================================================================
// Order Events - Domain Events for the Order Aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Created(OrderCreated),
    Claimed(OrderClaimed),
    Completed(OrderCompleted),
    Cancelled(OrderCancelled),
}

impl OrderEvent {
    /// The actor whose request produced this event
    pub fn actor_id(&self) -> ActorId {
        match self {
            OrderEvent::Created(e) => e.created_by,
            OrderEvent::Claimed(e) => e.loader_id,
            OrderEvent::Completed(e) => e.loader_id,
            OrderEvent::Cancelled(e) => e.dispatcher_id,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::Created(e) => e.created_at,
            OrderEvent::Claimed(e) => e.claimed_at,
            OrderEvent::Completed(e) => e.completed_at,
            OrderEvent::Cancelled(e) => e.cancelled_at,
        }
    }

    /// Status edge this event records. Creation has no source status.
    pub fn transition(&self) -> (Option<OrderStatus>, OrderStatus) {
        match self {
            OrderEvent::Created(_) => (None, OrderStatus::Available),
            OrderEvent::Claimed(_) => (Some(OrderStatus::Available), OrderStatus::Taken),
            OrderEvent::Completed(_) => (Some(OrderStatus::Taken), OrderStatus::Completed),
            OrderEvent::Cancelled(_) => (Some(OrderStatus::Available), OrderStatus::Cancelled),
        }
    }
}

impl DomainEvent for OrderEvent {
    fn name(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => "OrderCreated",
            OrderEvent::Claimed(_) => "OrderClaimed",
            OrderEvent::Completed(_) => "OrderCompleted",
            OrderEvent::Cancelled(_) => "OrderCancelled",
        }
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// Order Created - published by a dispatcher, open for loaders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub created_by: ActorId,
    pub address: String,
    pub date_time: DateTime<Utc>,
    pub cargo_description: String,
    pub price_per_hour: f64,
    pub created_at: DateTime<Utc>,
}

/// Order Claimed - a loader took the order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderClaimed {
    pub loader_id: ActorId,
    pub claimed_at: DateTime<Utc>,
}

/// Order Completed - the assignee finished the work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCompleted {
    pub loader_id: ActorId,
    pub completed_at: DateTime<Utc>,
}

/// Order Cancelled - withdrawn by its dispatcher before anyone claimed it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub dispatcher_id: ActorId,
    pub cancelled_at: DateTime<Utc>,
}

// ============================================================================
// Lifecycle Event - the record pushed to notification consumers
// ============================================================================

/// Delivered at least once, in commit order per order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub order_id: Uuid,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub actor_id: ActorId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn from_envelope(envelope: &EventEnvelope<OrderEvent>) -> Self {
        let (from_status, to_status) = envelope.event_data.transition();
        Self {
            order_id: envelope.aggregate_id,
            from_status,
            to_status,
            actor_id: envelope.event_data.actor_id(),
            timestamp: envelope.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_transitions() {
        let loader = ActorId::new();
        let claimed = OrderEvent::Claimed(OrderClaimed { loader_id: loader, claimed_at: Utc::now() });
        assert_eq!(
            claimed.transition(),
            (Some(OrderStatus::Available), OrderStatus::Taken)
        );
        assert_eq!(claimed.actor_id(), loader);
        assert_eq!(claimed.name(), "OrderClaimed");
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = OrderEvent::Cancelled(OrderCancelled {
            dispatcher_id: ActorId::new(),
            cancelled_at: Utc::now(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Cancelled");
        assert!(json["data"]["dispatcher_id"].is_string());
    }

    #[test]
    fn test_lifecycle_event_from_envelope() {
        let order_id = Uuid::new_v4();
        let loader = ActorId::new();
        let at = Utc::now();
        let envelope = EventEnvelope::new(
            order_id,
            3,
            OrderEvent::Completed(OrderCompleted { loader_id: loader, completed_at: at }),
            Uuid::new_v4(),
        )
        .with_timestamp(at);

        let event = LifecycleEvent::from_envelope(&envelope);
        assert_eq!(event.order_id, order_id);
        assert_eq!(event.from_status, Some(OrderStatus::Taken));
        assert_eq!(event.to_status, OrderStatus::Completed);
        assert_eq!(event.actor_id, loader);
    }

    #[test]
    fn test_lifecycle_event_wire_format() {
        let event = LifecycleEvent {
            order_id: Uuid::new_v4(),
            from_status: None,
            to_status: OrderStatus::Available,
            actor_id: ActorId::new(),
            timestamp: DateTime::from_timestamp_millis(1_767_225_600_000).unwrap(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["toStatus"], "AVAILABLE");
        assert!(json["fromStatus"].is_null());
        assert_eq!(json["timestamp"], 1_767_225_600_000i64);
        assert!(json.get("orderId").is_some());
        assert!(json.get("actorId").is_some());
    }
}
