use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::event_sourcing::core::{Aggregate, DomainEvent, EventEnvelope};

// ============================================================================
// Generic Event Log - Append-only record of every event
// ============================================================================
//
// Responsibilities:
// 1. Append events (append-only, global order preserved)
// 2. Load event history for one aggregate
// 3. Optimistic concurrency: appends carry the version they were decided on
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EventLogError {
    #[error("Cannot append empty event list")]
    Empty,

    #[error("Concurrency conflict on {aggregate_id}: expected version {expected}, but current is {actual}")]
    VersionConflict {
        aggregate_id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("Event {event_id} is out of sequence: expected {expected}, got {actual}")]
    OutOfSequence {
        event_id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("Event {event_id} belongs to aggregate {actual}, not {expected}")]
    ForeignAggregate {
        event_id: Uuid,
        expected: Uuid,
        actual: Uuid,
    },
}

struct LogState<E> {
    entries: Vec<EventEnvelope<E>>,
    versions: HashMap<Uuid, i64>,
}

pub struct EventLog<E: DomainEvent> {
    stream_name: String,
    state: Mutex<LogState<E>>,
}

impl<E: DomainEvent> EventLog<E> {
    pub fn new(stream_name: &str) -> Self {
        Self {
            stream_name: stream_name.to_string(),
            state: Mutex::new(LogState {
                entries: Vec::new(),
                versions: HashMap::new(),
            }),
        }
    }

    /// Append events for one aggregate.
    /// Returns the new version number after appending.
    pub async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: Vec<EventEnvelope<E>>,
    ) -> Result<i64, EventLogError> {
        if events.is_empty() {
            return Err(EventLogError::Empty);
        }

        let mut state = self.state.lock().await;

        let current_version = state.versions.get(&aggregate_id).copied().unwrap_or(0);
        if current_version != expected_version {
            return Err(EventLogError::VersionConflict {
                aggregate_id,
                expected: expected_version,
                actual: current_version,
            });
        }

        // Validate the whole batch before writing any of it
        let mut new_version = expected_version;
        for envelope in &events {
            if envelope.aggregate_id != aggregate_id {
                return Err(EventLogError::ForeignAggregate {
                    event_id: envelope.event_id,
                    expected: aggregate_id,
                    actual: envelope.aggregate_id,
                });
            }
            new_version += 1;
            if envelope.sequence_number != new_version {
                return Err(EventLogError::OutOfSequence {
                    event_id: envelope.event_id,
                    expected: new_version,
                    actual: envelope.sequence_number,
                });
            }
        }

        let event_count = events.len();
        state.entries.extend(events);
        state.versions.insert(aggregate_id, new_version);

        tracing::debug!(
            stream = %self.stream_name,
            aggregate_id = %aggregate_id,
            new_version = new_version,
            event_count = event_count,
            "Appended events to log"
        );

        Ok(new_version)
    }

    /// All events for an aggregate, in sequence order
    pub async fn load_events(&self, aggregate_id: Uuid) -> Vec<EventEnvelope<E>> {
        let state = self.state.lock().await;
        state
            .entries
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Rebuild an aggregate from its logged events
    pub async fn load_aggregate<A>(&self, aggregate_id: Uuid) -> anyhow::Result<A>
    where
        A: Aggregate<Event = E>,
        <A as Aggregate>::Error: std::fmt::Display,
    {
        let events = self.load_events(aggregate_id).await;

        if events.is_empty() {
            anyhow::bail!("Aggregate not found in {}: {}", self.stream_name, aggregate_id);
        }

        A::load_from_events(&events)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
