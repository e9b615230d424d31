use super::value_objects::{ActorId, OrderAction, OrderStatus};

// ============================================================================
// Order Commands - Transitions requested on an existing order
// ============================================================================
//
// Creation is not a command on an aggregate; see `Order::register`.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderCommand {
    ClaimOrder { loader_id: ActorId },
    CompleteOrder { loader_id: ActorId },
    CancelOrder { dispatcher_id: ActorId },
}

impl OrderCommand {
    pub fn action(&self) -> OrderAction {
        match self {
            OrderCommand::ClaimOrder { .. } => OrderAction::Claim,
            OrderCommand::CompleteOrder { .. } => OrderAction::Complete,
            OrderCommand::CancelOrder { .. } => OrderAction::Cancel,
        }
    }

    pub fn actor_id(&self) -> ActorId {
        match self {
            OrderCommand::ClaimOrder { loader_id } => *loader_id,
            OrderCommand::CompleteOrder { loader_id } => *loader_id,
            OrderCommand::CancelOrder { dispatcher_id } => *dispatcher_id,
        }
    }

    /// The only status the command can be applied from
    pub fn expected_status(&self) -> OrderStatus {
        match self {
            OrderCommand::ClaimOrder { .. } => OrderStatus::Available,
            OrderCommand::CompleteOrder { .. } => OrderStatus::Taken,
            OrderCommand::CancelOrder { .. } => OrderStatus::Available,
        }
    }
}
