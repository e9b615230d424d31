use actix::prelude::*;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

use crate::domain::order::LifecycleEvent;

// ============================================================================
// Dead Letter Actor
// ============================================================================
//
// Keeps lifecycle events that a sink could not take after all retry
// attempts, so an operator can inspect them. Bounded; the oldest entries
// are evicted first.
//
// ============================================================================

pub const DEFAULT_DEAD_LETTER_CAPACITY: usize = 10_000;

pub struct DeadLetterActor {
    entries: VecDeque<DeadLetter>,
    capacity: usize,
    evicted: u64,
}

impl DeadLetterActor {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            evicted: 0,
        }
    }
}

impl Actor for DeadLetterActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(capacity = self.capacity, "DeadLetterActor started");
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct AddDeadLetter {
    pub sink: String,
    pub event: LifecycleEvent,
    pub error_message: String,
    pub attempts: u32,
}

/// Most recent entries first
#[derive(Message)]
#[rtype(result = "Vec<DeadLetter>")]
pub struct GetDeadLetters {
    pub limit: usize,
}

#[derive(Message)]
#[rtype(result = "DeadLetterStats")]
pub struct GetDeadLetterStats;

#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub id: Uuid,
    pub sink: String,
    pub event: LifecycleEvent,
    pub error_message: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeadLetterStats {
    pub total: usize,
    pub evicted: u64,
    pub by_sink: HashMap<String, usize>,
}

// ============================================================================
// Handlers
// ============================================================================

impl Handler<AddDeadLetter> for DeadLetterActor {
    type Result = ();

    fn handle(&mut self, msg: AddDeadLetter, _: &mut Self::Context) {
        tracing::error!(
            sink = %msg.sink,
            order_id = %msg.event.order_id,
            to_status = %msg.event.to_status,
            error = %msg.error_message,
            attempts = msg.attempts,
            "💀 Notification moved to dead letters"
        );

        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.evicted += 1;
        }

        self.entries.push_back(DeadLetter {
            id: Uuid::new_v4(),
            sink: msg.sink,
            event: msg.event,
            error_message: msg.error_message,
            attempts: msg.attempts,
            failed_at: Utc::now(),
        });
    }
}

impl Handler<GetDeadLetters> for DeadLetterActor {
    type Result = MessageResult<GetDeadLetters>;

    fn handle(&mut self, msg: GetDeadLetters, _: &mut Self::Context) -> Self::Result {
        MessageResult(self.entries.iter().rev().take(msg.limit).cloned().collect())
    }
}

impl Handler<GetDeadLetterStats> for DeadLetterActor {
    type Result = MessageResult<GetDeadLetterStats>;

    fn handle(&mut self, _msg: GetDeadLetterStats, _: &mut Self::Context) -> Self::Result {
        let mut by_sink = HashMap::new();
        for entry in &self.entries {
            *by_sink.entry(entry.sink.clone()).or_insert(0) += 1;
        }

        MessageResult(DeadLetterStats {
            total: self.entries.len(),
            evicted: self.evicted,
            by_sink,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{ActorId, OrderStatus};

    fn dead_letter(sink: &str) -> AddDeadLetter {
        AddDeadLetter {
            sink: sink.to_string(),
            event: LifecycleEvent {
                order_id: Uuid::new_v4(),
                from_status: Some(OrderStatus::Available),
                to_status: OrderStatus::Taken,
                actor_id: ActorId::new(),
                timestamp: Utc::now(),
            },
            error_message: "connection refused".to_string(),
            attempts: 3,
        }
    }

    #[actix::test]
    async fn test_dead_letters_are_listed_newest_first() {
        let actor = DeadLetterActor::new(100).start();
        let first = dead_letter("redis");
        let second = dead_letter("redis");

        actor.send(first.clone()).await.unwrap();
        actor.send(second.clone()).await.unwrap();

        let listed = actor.send(GetDeadLetters { limit: 10 }).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].event, second.event);
        assert_eq!(listed[1].event, first.event);
        assert_eq!(listed[0].attempts, 3);
    }

    #[actix::test]
    async fn test_stats_group_by_sink() {
        let actor = DeadLetterActor::new(100).start();
        actor.send(dead_letter("redis")).await.unwrap();
        actor.send(dead_letter("redis")).await.unwrap();
        actor.send(dead_letter("broadcast")).await.unwrap();

        let stats = actor.send(GetDeadLetterStats).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_sink.get("redis"), Some(&2));
        assert_eq!(stats.by_sink.get("broadcast"), Some(&1));
    }

    #[actix::test]
    async fn test_oldest_entries_are_evicted_at_capacity() {
        let actor = DeadLetterActor::new(2).start();
        let first = dead_letter("redis");
        actor.send(first.clone()).await.unwrap();
        actor.send(dead_letter("redis")).await.unwrap();
        actor.send(dead_letter("redis")).await.unwrap();

        let listed = actor.send(GetDeadLetters { limit: 10 }).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|entry| entry.event != first.event));

        let stats = actor.send(GetDeadLetterStats).await.unwrap();
        assert_eq!(stats.evicted, 1);
    }
}
