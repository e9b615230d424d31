use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::event_sourcing::EventLogError;
use super::value_objects::{ActorId, OrderAction, OrderStatus};

// ============================================================================
// Order Business Rule Errors
// ============================================================================

/// Bad input on creation. Nothing is stored.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Address cannot be empty")]
    EmptyAddress,

    #[error("Cargo description cannot be empty")]
    EmptyCargoDescription,

    #[error("Price per hour must be a positive number, got {0}")]
    NonPositivePrice(f64),

    #[error("Scheduled time {scheduled} is in the past (now {now})")]
    ScheduledInPast {
        scheduled: DateTime<Utc>,
        now: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("Invalid order: {0}")]
    Validation(#[from] ValidationError),

    #[error("Order not found: {0}")]
    NotFound(Uuid),

    /// The order moved on before this request could apply.
    #[error("Order {order_id} is {actual}, expected {expected}")]
    Conflict {
        order_id: Uuid,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    #[error("Actor {actor_id} may not {action} order {order_id}")]
    Forbidden {
        order_id: Uuid,
        actor_id: ActorId,
        action: OrderAction,
    },

    #[error("Cannot {action} an order in status {status}")]
    InvalidTransition {
        action: OrderAction,
        status: OrderStatus,
    },

    #[error("Event log rejected the transition: {0}")]
    EventLog(#[from] EventLogError),

    #[error("Aggregate not initialized")]
    NotInitialized,
}

impl OrderError {
    /// `Conflict` and `NotFound` may succeed after the caller re-fetches;
    /// everything else needs a different request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrderError::Conflict { .. } | OrderError::NotFound(_))
    }

    /// Stable label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "validation",
            OrderError::NotFound(_) => "not_found",
            OrderError::Conflict { .. } => "conflict",
            OrderError::Forbidden { .. } => "forbidden",
            OrderError::InvalidTransition { .. } => "invalid_transition",
            OrderError::EventLog(_) => "event_log",
            OrderError::NotInitialized => "not_initialized",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        let id = Uuid::new_v4();
        assert!(OrderError::NotFound(id).is_retryable());
        assert!(OrderError::Conflict {
            order_id: id,
            expected: OrderStatus::Available,
            actual: OrderStatus::Taken,
        }
        .is_retryable());

        assert!(!OrderError::Validation(ValidationError::EmptyAddress).is_retryable());
        assert!(!OrderError::Forbidden {
            order_id: id,
            actor_id: ActorId::new(),
            action: OrderAction::Cancel,
        }
        .is_retryable());
        assert!(!OrderError::InvalidTransition {
            action: OrderAction::Claim,
            status: OrderStatus::Cancelled,
        }
        .is_retryable());
    }

    #[test]
    fn test_messages_name_the_status() {
        let err = OrderError::InvalidTransition {
            action: OrderAction::Cancel,
            status: OrderStatus::Taken,
        };
        assert_eq!(err.to_string(), "Cannot cancel an order in status TAKEN");
        assert_eq!(err.kind(), "invalid_transition");
    }
}
