mod server;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    IntGaugeVec, Opts, Registry,
};

pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Order creation and lifecycle transitions (throughput, latency)
// - Rejected requests by reason
// - Notification delivery, retries and dead letters
// - Circuit breaker state per notification sink
//
// All metrics are registered with one Registry and scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Order Lifecycle Metrics
    pub orders_created: IntCounter,
    pub transitions_total: IntCounterVec,
    pub rejections_total: IntCounterVec,
    pub command_duration: HistogramVec,

    // Notification Metrics
    pub notifications_delivered: IntCounterVec,
    pub notification_failures: IntCounterVec,
    pub notification_retries: IntCounterVec,
    pub dead_letters_total: IntCounter,

    // Circuit Breaker Metrics
    pub circuit_breaker_state: IntGaugeVec,
    pub circuit_breaker_transitions: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::new(
            "orders_created_total",
            "Total orders created by dispatchers",
        )?;
        registry.register(Box::new(orders_created.clone()))?;

        let transitions_total = IntCounterVec::new(
            Opts::new("order_transitions_total", "Successful lifecycle transitions"),
            &["action"],
        )?;
        registry.register(Box::new(transitions_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("order_rejections_total", "Rejected order requests"),
            &["action", "reason"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let command_duration = HistogramVec::new(
            HistogramOpts::new("order_command_duration_seconds", "Order request handling duration")
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
            &["action"],
        )?;
        registry.register(Box::new(command_duration.clone()))?;

        let notifications_delivered = IntCounterVec::new(
            Opts::new("notifications_delivered_total", "Lifecycle events delivered per sink"),
            &["sink"],
        )?;
        registry.register(Box::new(notifications_delivered.clone()))?;

        let notification_failures = IntCounterVec::new(
            Opts::new("notification_failures_total", "Lifecycle events a sink failed to take"),
            &["sink", "reason"],
        )?;
        registry.register(Box::new(notification_failures.clone()))?;

        let notification_retries = IntCounterVec::new(
            Opts::new("notification_retries_total", "Delivery retry attempts per sink"),
            &["sink"],
        )?;
        registry.register(Box::new(notification_retries.clone()))?;

        let dead_letters_total = IntCounter::new(
            "notification_dead_letters_total",
            "Lifecycle events moved to the dead letter store",
        )?;
        registry.register(Box::new(dead_letters_total.clone()))?;

        let circuit_breaker_state = IntGaugeVec::new(
            Opts::new(
                "circuit_breaker_state",
                "Circuit breaker state per sink (0=Closed, 1=Open, 2=HalfOpen)",
            ),
            &["sink"],
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        let circuit_breaker_transitions = IntCounterVec::new(
            Opts::new("circuit_breaker_transitions_total", "Circuit breaker state transitions"),
            &["sink", "from_state", "to_state"],
        )?;
        registry.register(Box::new(circuit_breaker_transitions.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            transitions_total,
            rejections_total,
            command_duration,
            notifications_delivered,
            notification_failures,
            notification_retries,
            dead_letters_total,
            circuit_breaker_state,
            circuit_breaker_transitions,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record the outcome of one order request
    pub fn record_command(&self, action: &str, duration_secs: f64, outcome: Result<(), &str>) {
        match outcome {
            Ok(()) if action == "create" => self.orders_created.inc(),
            Ok(()) => self.transitions_total.with_label_values(&[action]).inc(),
            Err(reason) => self.rejections_total.with_label_values(&[action, reason]).inc(),
        }
        self.command_duration.with_label_values(&[action]).observe(duration_secs);
    }

    pub fn record_delivery(&self, sink: &str, outcome: Result<(), &str>) {
        match outcome {
            Ok(()) => self.notifications_delivered.with_label_values(&[sink]).inc(),
            Err(reason) => self.notification_failures.with_label_values(&[sink, reason]).inc(),
        }
    }

    pub fn record_retry(&self, sink: &str) {
        self.notification_retries.with_label_values(&[sink]).inc();
    }

    pub fn record_dead_letter(&self) {
        self.dead_letters_total.inc();
    }

    pub fn update_circuit_breaker_state(&self, sink: &str, state: i64) {
        self.circuit_breaker_state.with_label_values(&[sink]).set(state);
    }

    pub fn record_circuit_breaker_transition(&self, sink: &str, from_state: &str, to_state: &str) {
        self.circuit_breaker_transitions
            .with_label_values(&[sink, from_state, to_state])
            .inc();
    }
}
