use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, Utc};

use crate::event_sourcing::Aggregate;
use super::value_objects::{ActorId, NewOrder, OrderAction, OrderStatus};
use super::events::*;
use super::commands::OrderCommand;
use super::errors::OrderError;

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub version: i64,

    // Work description
    pub address: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date_time: DateTime<Utc>,
    pub cargo_description: String,
    pub price_per_hour: f64,

    // Lifecycle
    pub status: OrderStatus,
    /// Set exactly when status is TAKEN or COMPLETED, never cleared.
    pub assignee: Option<ActorId>,
    pub created_by: ActorId,

    // Audit Trail
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Validate a creation request and produce the event that starts an
    /// order's history.
    pub fn register(
        created_by: ActorId,
        request: &NewOrder,
        now: DateTime<Utc>,
        schedule_grace: Duration,
    ) -> Result<OrderEvent, OrderError> {
        request.validate(now, schedule_grace)?;

        Ok(OrderEvent::Created(OrderCreated {
            created_by,
            address: request.address.trim().to_string(),
            date_time: request.date_time,
            cargo_description: request.cargo_description.trim().to_string(),
            price_per_hour: request.price_per_hour,
            created_at: now,
        }))
    }

    fn require_status(&self, action: OrderAction, expected: OrderStatus) -> Result<(), OrderError> {
        if self.status != expected {
            return Err(OrderError::InvalidTransition { action, status: self.status });
        }
        Ok(())
    }

    fn forbidden(&self, actor_id: ActorId, action: OrderAction) -> OrderError {
        OrderError::Forbidden { order_id: self.id, actor_id, action }
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for Order {
    type Event = OrderEvent;
    type Command = OrderCommand;
    type Error = OrderError;

    fn apply_first_event(id: Uuid, event: &Self::Event) -> Result<Self, Self::Error> {
        match event {
            OrderEvent::Created(e) => Ok(Self {
                id,
                version: 0,
                address: e.address.clone(),
                date_time: e.date_time,
                cargo_description: e.cargo_description.clone(),
                price_per_hour: e.price_per_hour,
                status: OrderStatus::Available,
                assignee: None,
                created_by: e.created_by,
                created_at: e.created_at,
                updated_at: e.created_at,
            }),
            _ => Err(OrderError::NotInitialized),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            OrderEvent::Created(_) => {
                return Err(OrderError::InvalidTransition {
                    action: OrderAction::Create,
                    status: self.status,
                });
            }
            OrderEvent::Claimed(e) => {
                self.require_status(OrderAction::Claim, OrderStatus::Available)?;
                self.status = OrderStatus::Taken;
                self.assignee = Some(e.loader_id);
            }
            OrderEvent::Completed(_) => {
                self.require_status(OrderAction::Complete, OrderStatus::Taken)?;
                self.status = OrderStatus::Completed;
            }
            OrderEvent::Cancelled(_) => {
                self.require_status(OrderAction::Cancel, OrderStatus::Available)?;
                self.status = OrderStatus::Cancelled;
            }
        }

        self.updated_at = event.occurred_at();
        Ok(())
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let now = Utc::now();

        match *command {
            OrderCommand::ClaimOrder { loader_id } => match self.status {
                OrderStatus::Available => Ok(vec![OrderEvent::Claimed(OrderClaimed {
                    loader_id,
                    claimed_at: now,
                })]),
                // Someone else won the claim
                OrderStatus::Taken => Err(OrderError::Conflict {
                    order_id: self.id,
                    expected: OrderStatus::Available,
                    actual: OrderStatus::Taken,
                }),
                status => Err(OrderError::InvalidTransition { action: OrderAction::Claim, status }),
            },

            OrderCommand::CompleteOrder { loader_id } => {
                self.require_status(OrderAction::Complete, OrderStatus::Taken)?;
                if self.assignee != Some(loader_id) {
                    return Err(self.forbidden(loader_id, OrderAction::Complete));
                }

                Ok(vec![OrderEvent::Completed(OrderCompleted {
                    loader_id,
                    completed_at: now,
                })])
            }

            OrderCommand::CancelOrder { dispatcher_id } => {
                self.require_status(OrderAction::Cancel, OrderStatus::Available)?;
                if self.created_by != dispatcher_id {
                    return Err(self.forbidden(dispatcher_id, OrderAction::Cancel));
                }

                Ok(vec![OrderEvent::Cancelled(OrderCancelled {
                    dispatcher_id,
                    cancelled_at: now,
                })])
            }
        }
    }

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
