// ============================================================================
// Order Domain - Business Logic for the Order Aggregate
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (OrderStatus, ActorId, NewOrder)
// - Events (OrderCreated, OrderClaimed, ..., LifecycleEvent)
// - Commands (ClaimOrder, CompleteOrder, CancelOrder)
// - Errors (OrderError, ValidationError)
// - Aggregate (Order with the lifecycle rules)
// - Store (OrderStore with the compare-and-swap entry point)
// - Command Handler (AssignmentCoordinator)
// - Queries (OrderQueries)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod store;
pub mod command_handler;
pub mod queries;

// Re-export for convenience
pub use command_handler::AssignmentCoordinator;
pub use events::LifecycleEvent;
pub use queries::OrderQueries;
pub use store::OrderStore;
pub use value_objects::{ActorId, NewOrder, OrderStatus};
