use crate::domain::order::LifecycleEvent;

// ============================================================================
// Notification Hook - boundary to push/socket delivery
// ============================================================================
//
// Fire-and-forget. The order store is authoritative; a lost notification
// only means a client re-queries.
//
// The store calls `publish` while it still holds the order's lock, so
// implementations hand the event off and return.
//
// ============================================================================

pub trait NotificationHook: Send + Sync {
    fn publish(&self, event: LifecycleEvent);
}

/// Drops every event
pub struct NoopHook;

impl NotificationHook for NoopHook {
    fn publish(&self, event: LifecycleEvent) {
        tracing::trace!(order_id = %event.order_id, "Notification dropped (no hook configured)");
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::NotificationHook;
    use crate::domain::order::LifecycleEvent;

    /// Keeps published events in memory
    #[derive(Default)]
    pub struct RecordingHook {
        events: Mutex<Vec<LifecycleEvent>>,
    }

    impl RecordingHook {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<LifecycleEvent> {
            match self.events.lock() {
                Ok(events) => events.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            }
        }
    }

    impl NotificationHook for RecordingHook {
        fn publish(&self, event: LifecycleEvent) {
            match self.events.lock() {
                Ok(mut events) => events.push(event),
                Err(poisoned) => poisoned.into_inner().push(event),
            }
        }
    }
}
