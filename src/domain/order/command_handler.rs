use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::event_sourcing::Aggregate;
use crate::metrics::Metrics;

use super::aggregate::Order;
use super::commands::OrderCommand;
use super::errors::OrderError;
use super::store::{OrderStore, Transition};
use super::value_objects::{ActorId, NewOrder, OrderAction};

// ============================================================================
// Assignment Coordinator - Order Command Handler
// ============================================================================
//
// Orchestrates: Command → Aggregate → OrderStore CAS
//
// Lifecycle notifications are published by the store as part of the commit.
//
// Racing claims are settled by the store: every claim expects AVAILABLE, so
// after the first commit the rest see TAKEN and fail with `Conflict`.
//
// ============================================================================

pub struct AssignmentCoordinator {
    store: Arc<OrderStore>,
    metrics: Option<Arc<Metrics>>,
}

impl AssignmentCoordinator {
    pub fn new(store: Arc<OrderStore>) -> Self {
        Self { store, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Publish a new AVAILABLE order on behalf of a dispatcher
    pub async fn create(&self, dispatcher: ActorId, request: NewOrder) -> Result<Order, OrderError> {
        let correlation_id = Uuid::new_v4();
        let started = Instant::now();

        let result = self.store.create(dispatcher, request, correlation_id).await;
        self.finish(OrderAction::Create, dispatcher, None, correlation_id, started, result)
    }

    /// "Take order": AVAILABLE → TAKEN
    pub async fn claim(&self, order_id: Uuid, loader: ActorId) -> Result<Order, OrderError> {
        self.execute(order_id, OrderCommand::ClaimOrder { loader_id: loader }).await
    }

    /// TAKEN → COMPLETED, assignee only
    pub async fn complete(&self, order_id: Uuid, loader: ActorId) -> Result<Order, OrderError> {
        self.execute(order_id, OrderCommand::CompleteOrder { loader_id: loader }).await
    }

    /// AVAILABLE → CANCELLED, creator only
    pub async fn cancel(&self, order_id: Uuid, dispatcher: ActorId) -> Result<Order, OrderError> {
        self.execute(order_id, OrderCommand::CancelOrder { dispatcher_id: dispatcher }).await
    }

    async fn execute(&self, order_id: Uuid, command: OrderCommand) -> Result<Order, OrderError> {
        let correlation_id = Uuid::new_v4();
        let started = Instant::now();

        let result = self.transition(order_id, command, correlation_id).await;
        self.finish(
            command.action(),
            command.actor_id(),
            Some(order_id),
            correlation_id,
            started,
            result,
        )
    }

    async fn transition(
        &self,
        order_id: Uuid,
        command: OrderCommand,
        correlation_id: Uuid,
    ) -> Result<Transition, OrderError> {
        // Reject early against a snapshot so the caller gets the precise error
        let snapshot = self.store.get(order_id).await?;
        snapshot.handle_command(&command)?;

        self.store
            .apply_transition(order_id, command.expected_status(), correlation_id, |current| {
                current.handle_command(&command)
            })
            .await
    }

    fn finish(
        &self,
        action: OrderAction,
        actor_id: ActorId,
        order_id: Option<Uuid>,
        correlation_id: Uuid,
        started: Instant,
        result: Result<Transition, OrderError>,
    ) -> Result<Order, OrderError> {
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(transition) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_command(action.as_str(), elapsed, Ok(()));
                }

                tracing::info!(
                    order_id = %transition.order.id,
                    action = %action,
                    actor_id = %actor_id,
                    status = %transition.order.status,
                    version = transition.order.version,
                    correlation_id = %correlation_id,
                    "✅ Order request applied"
                );

                Ok(transition.order)
            }
            Err(error) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_command(action.as_str(), elapsed, Err(error.kind()));
                }

                tracing::warn!(
                    order_id = ?order_id,
                    action = %action,
                    actor_id = %actor_id,
                    error = %error,
                    retryable = error.is_retryable(),
                    correlation_id = %correlation_id,
                    "Order request rejected"
                );

                Err(error)
            }
        }
    }
}
