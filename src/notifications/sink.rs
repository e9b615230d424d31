use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::{broadcast, Mutex};

use crate::domain::order::LifecycleEvent;
use crate::utils::IsTransient;

// ============================================================================
// Notification Sinks - where lifecycle events end up
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Transport down or timing out; worth retrying
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    /// The transport refused this event; retrying will not help
    #[error("Event rejected: {0}")]
    Rejected(String),

    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SinkError {
    pub fn reason(&self) -> &'static str {
        match self {
            SinkError::Unavailable(_) => "unavailable",
            SinkError::Rejected(_) => "rejected",
            SinkError::Encode(_) => "encode",
        }
    }
}

impl IsTransient for SinkError {
    fn is_transient(&self) -> bool {
        matches!(self, SinkError::Unavailable(_))
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Label used in logs, metrics and dead letters
    fn name(&self) -> &str;

    async fn deliver(&self, event: &LifecycleEvent) -> Result<(), SinkError>;
}

// ============================================================================
// Log Sink
// ============================================================================

/// Writes one structured log line per event
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, event: &LifecycleEvent) -> Result<(), SinkError> {
        tracing::info!(
            order_id = %event.order_id,
            from_status = ?event.from_status,
            to_status = %event.to_status,
            actor_id = %event.actor_id,
            "🔔 Order lifecycle event"
        );
        Ok(())
    }
}

// ============================================================================
// Broadcast Sink - live subscribers (sockets) in this process
// ============================================================================

pub struct BroadcastSink {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl NotificationSink for BroadcastSink {
    fn name(&self) -> &str {
        "broadcast"
    }

    async fn deliver(&self, event: &LifecycleEvent) -> Result<(), SinkError> {
        match self.sender.send(event.clone()) {
            Ok(receivers) => {
                tracing::debug!(order_id = %event.order_id, receivers = receivers, "Broadcast lifecycle event");
            }
            Err(_) => {
                // Nobody is listening right now; they re-query on connect
                tracing::debug!(order_id = %event.order_id, "No live subscribers for lifecycle event");
            }
        }
        Ok(())
    }
}

// ============================================================================
// Redis Sink - pub/sub channel consumed by the push gateway
// ============================================================================

pub struct RedisSink {
    client: redis::Client,
    channel: String,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisSink {
    pub fn new(url: &str, channel: &str) -> Result<Self, SinkError> {
        let client = redis::Client::open(url)
            .map_err(|e| SinkError::Rejected(format!("invalid redis url: {}", e)))?;

        Ok(Self {
            client,
            channel: channel.to_string(),
            connection: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, SinkError> {
        let mut cached = self.connection.lock().await;
        if let Some(conn) = cached.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;

        tracing::info!(channel = %self.channel, "Connected to Redis");
        *cached = Some(conn.clone());
        Ok(conn)
    }
}

#[async_trait]
impl NotificationSink for RedisSink {
    fn name(&self) -> &str {
        "redis"
    }

    async fn deliver(&self, event: &LifecycleEvent) -> Result<(), SinkError> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.connection().await?;

        let published: Result<i64, redis::RedisError> = conn.publish(&self.channel, payload).await;
        match published {
            Ok(receivers) => {
                tracing::debug!(
                    order_id = %event.order_id,
                    channel = %self.channel,
                    receivers = receivers,
                    "Published lifecycle event to Redis"
                );
                Ok(())
            }
            Err(e) => {
                // Drop the connection so the next attempt reconnects
                self.connection.lock().await.take();
                Err(SinkError::Unavailable(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{ActorId, OrderStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn event(to_status: OrderStatus) -> LifecycleEvent {
        LifecycleEvent {
            order_id: Uuid::new_v4(),
            from_status: Some(OrderStatus::Available),
            to_status,
            actor_id: ActorId::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_only_unavailable_is_transient() {
        assert!(SinkError::Unavailable("timeout".to_string()).is_transient());
        assert!(!SinkError::Rejected("too large".to_string()).is_transient());
    }

    #[tokio::test]
    async fn test_broadcast_sink_reaches_subscribers() {
        let sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();
        let sent = event(OrderStatus::Taken);

        sink.deliver(&sent).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), sent);
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_not_an_error() {
        let sink = BroadcastSink::new(8);
        assert!(sink.deliver(&event(OrderStatus::Cancelled)).await.is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_accepts_events() {
        assert!(LogSink.deliver(&event(OrderStatus::Completed)).await.is_ok());
        assert_eq!(LogSink.name(), "log");
    }

    #[test]
    fn test_redis_sink_rejects_bad_url() {
        let result = RedisSink::new("not a url", "orders");
        assert!(matches!(result, Err(SinkError::Rejected(_))));
    }
}
