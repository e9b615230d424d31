// ============================================================================
// Event Sourcing Store - Generic Persistence Layer
// ============================================================================

pub mod event_log;

pub use event_log::{EventLog, EventLogError};
