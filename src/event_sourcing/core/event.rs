use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

// ============================================================================
// Event Envelope - Event Metadata
// ============================================================================
//
// Wraps domain events with the metadata the log and the notification
// pipeline need. Generic over the event payload.
//
// ============================================================================

/// Generic Event Envelope - wraps any domain event with metadata
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventEnvelope<E> {
    // Event Identity
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub sequence_number: i64,

    // Event Type Information
    pub event_type: String,
    pub event_version: i32,

    // Event Payload
    pub event_data: E,

    // Groups every event produced by one request
    pub correlation_id: Uuid,

    // Who triggered this event
    pub actor_id: Option<Uuid>,

    pub timestamp: DateTime<Utc>,
}

impl<E: DomainEvent> EventEnvelope<E> {
    pub fn new(
        aggregate_id: Uuid,
        sequence_number: i64,
        event_data: E,
        correlation_id: Uuid,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_id,
            sequence_number,
            event_type: event_data.name().to_string(),
            event_version: E::event_version(),
            event_data,
            correlation_id,
            actor_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// All events stored in an `EventLog` implement this trait.
pub trait DomainEvent: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync {
    /// Name of the concrete variant, recorded as `event_type` on the envelope.
    fn name(&self) -> &'static str;

    fn event_version() -> i32 where Self: Sized { 1 }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    enum TestEvent {
        Opened { label: String },
        Closed,
    }

    impl DomainEvent for TestEvent {
        fn name(&self) -> &'static str {
            match self {
                TestEvent::Opened { .. } => "TestOpened",
                TestEvent::Closed => "TestClosed",
            }
        }
    }

    #[test]
    fn test_event_envelope_creation() {
        let aggregate_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();
        let actor_id = Uuid::new_v4();

        let envelope = EventEnvelope::new(aggregate_id, 1, TestEvent::Closed, correlation_id)
            .with_actor(actor_id);

        assert_eq!(envelope.aggregate_id, aggregate_id);
        assert_eq!(envelope.sequence_number, 1);
        assert_eq!(envelope.event_type, "TestClosed");
        assert_eq!(envelope.event_version, 1);
        assert_eq!(envelope.correlation_id, correlation_id);
        assert_eq!(envelope.actor_id, Some(actor_id));
    }

    #[test]
    fn test_envelope_serialization_keeps_payload() {
        let envelope = EventEnvelope::new(
            Uuid::new_v4(),
            3,
            TestEvent::Opened { label: "dock 4".to_string() },
            Uuid::new_v4(),
        );

        let json = serde_json::to_string(&envelope).unwrap();
        let restored: EventEnvelope<TestEvent> = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, envelope);
    }
}
