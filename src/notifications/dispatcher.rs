use actix::prelude::*;
use futures_util::future::join_all;
use std::sync::Arc;

use crate::domain::order::LifecycleEvent;
use crate::metrics::Metrics;
use crate::utils::{
    retry_on_transient, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState,
    RetryConfig, RetryResult,
};

use super::dead_letter::{AddDeadLetter, DeadLetterActor};
use super::hook::NotificationHook;
use super::sink::{NotificationSink, SinkError};

// ============================================================================
// Notification Dispatcher Actor
// ============================================================================
//
// Fans each lifecycle event out to every sink:
// - Retry with exponential backoff on transient sink errors
// - One circuit breaker per sink
// - Dead letter once retries are exhausted or the error is permanent
//
// Events are handled one at a time in arrival order, so per-order
// notifications leave in the order their transitions were committed.
//
// ============================================================================

#[derive(Clone)]
struct SinkSlot {
    sink: Arc<dyn NotificationSink>,
    breaker: CircuitBreaker,
}

pub struct NotificationDispatcher {
    sinks: Vec<SinkSlot>,
    retry: RetryConfig,
    breaker_config: CircuitBreakerConfig,
    dead_letters: Option<Addr<DeadLetterActor>>,
    metrics: Option<Arc<Metrics>>,
}

impl NotificationDispatcher {
    pub fn new(retry: RetryConfig, breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            sinks: Vec::new(),
            retry,
            breaker_config,
            dead_letters: None,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        for slot in &mut self.sinks {
            slot.breaker = slot.breaker.clone().with_metrics(metrics.clone());
        }
        self.metrics = Some(metrics);
        self
    }

    pub fn with_dead_letters(mut self, dead_letters: Addr<DeadLetterActor>) -> Self {
        self.dead_letters = Some(dead_letters);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        let mut breaker = CircuitBreaker::new(sink.name(), self.breaker_config.clone());
        if let Some(metrics) = &self.metrics {
            breaker = breaker.with_metrics(metrics.clone());
        }
        self.sinks.push(SinkSlot { sink, breaker });
        self
    }
}

impl Actor for NotificationDispatcher {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        let sinks: Vec<&str> = self.sinks.iter().map(|slot| slot.sink.name()).collect();
        tracing::info!(sinks = ?sinks, "NotificationDispatcher started");
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct PublishEvent(pub LifecycleEvent);

/// Resolves once every event sent before it has been handled
#[derive(Message, Debug)]
#[rtype(result = "()")]
pub struct Flush;

/// Breaker state of every sink, in registration order
#[derive(Message, Debug)]
#[rtype(result = "Vec<SinkHealth>")]
pub struct GetSinkHealth;

#[derive(Debug, Clone, PartialEq)]
pub struct SinkHealth {
    pub sink: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
}

// ============================================================================
// Handlers
// ============================================================================

impl Handler<PublishEvent> for NotificationDispatcher {
    type Result = ();

    fn handle(&mut self, msg: PublishEvent, ctx: &mut Self::Context) {
        let event = msg.0;
        let deliveries: Vec<_> = self
            .sinks
            .iter()
            .cloned()
            .map(|slot| {
                deliver(
                    slot,
                    event.clone(),
                    self.retry.clone(),
                    self.dead_letters.clone(),
                    self.metrics.clone(),
                )
            })
            .collect();

        // Block the mailbox until this event has settled on every sink
        ctx.wait(
            async move {
                join_all(deliveries).await;
            }
            .into_actor(self),
        );
    }
}

impl Handler<Flush> for NotificationDispatcher {
    type Result = ();

    fn handle(&mut self, _msg: Flush, _ctx: &mut Self::Context) {}
}

impl Handler<GetSinkHealth> for NotificationDispatcher {
    type Result = ResponseFuture<Vec<SinkHealth>>;

    fn handle(&mut self, _msg: GetSinkHealth, _ctx: &mut Self::Context) -> Self::Result {
        let breakers: Vec<CircuitBreaker> = self.sinks.iter().map(|slot| slot.breaker.clone()).collect();

        Box::pin(async move {
            let mut health = Vec::with_capacity(breakers.len());
            for breaker in breakers {
                health.push(SinkHealth {
                    sink: breaker.name().to_string(),
                    state: breaker.get_state().await,
                    consecutive_failures: breaker.get_failure_count().await,
                });
            }
            health
        })
    }
}

async fn deliver(
    slot: SinkSlot,
    event: LifecycleEvent,
    retry: RetryConfig,
    dead_letters: Option<Addr<DeadLetterActor>>,
    metrics: Option<Arc<Metrics>>,
) {
    let sink_name = slot.sink.name().to_string();

    let outcome = retry_on_transient(&retry, |attempt| {
        let slot = slot.clone();
        let event = event.clone();
        let metrics = metrics.clone();
        async move {
            if attempt > 1 {
                if let Some(metrics) = &metrics {
                    metrics.record_retry(slot.sink.name());
                }
            }
            slot.breaker.call(slot.sink.deliver(&event)).await
        }
    })
    .await;

    let (error, attempts) = match outcome {
        RetryResult::Success(()) => {
            if let Some(metrics) = &metrics {
                metrics.record_delivery(&sink_name, Ok(()));
            }
            return;
        }
        RetryResult::Failed { error, attempts } | RetryResult::PermanentFailure { error, attempts } => {
            (error, attempts)
        }
    };

    tracing::warn!(
        sink = %sink_name,
        order_id = %event.order_id,
        to_status = %event.to_status,
        attempts = attempts,
        error = %error,
        "Notification delivery failed"
    );

    if let Some(metrics) = &metrics {
        metrics.record_delivery(&sink_name, Err(failure_reason(&error)));
        metrics.record_dead_letter();
    }

    if let Some(dead_letters) = &dead_letters {
        dead_letters.do_send(AddDeadLetter {
            sink: sink_name,
            event,
            error_message: error.to_string(),
            attempts,
        });
    }
}

fn failure_reason(error: &CircuitBreakerError<SinkError>) -> &'static str {
    match error {
        CircuitBreakerError::CircuitOpen => "circuit_open",
        CircuitBreakerError::OperationFailed(e) => e.reason(),
    }
}

impl NotificationHook for Addr<NotificationDispatcher> {
    fn publish(&self, event: LifecycleEvent) {
        self.do_send(PublishEvent(event));
    }
}
