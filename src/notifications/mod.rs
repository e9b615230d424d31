// ============================================================================
// Notifications - lifecycle events out to loaders and dispatchers
// ============================================================================

pub mod dead_letter;
pub mod dispatcher;
pub mod hook;
pub mod sink;
pub mod subscriber;

pub use dead_letter::{DeadLetterActor, GetDeadLetterStats, GetDeadLetters};
pub use dispatcher::{Flush, GetSinkHealth, NotificationDispatcher};
pub use hook::{NoopHook, NotificationHook};
pub use sink::{BroadcastSink, LogSink, RedisSink};
pub use subscriber::EventSubscriber;
