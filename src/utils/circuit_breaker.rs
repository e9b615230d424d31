use std::sync::Arc;
use tokio::sync::Mutex;
use std::time::{Duration, Instant};

use crate::metrics::Metrics;
use super::retry::IsTransient;

// ============================================================================
// Circuit Breaker Pattern Implementation
// ============================================================================
//
// Stops calling a notification sink that keeps failing, then tries it
// again after a cool-down. Only transient errors count as failures: a sink
// that rejects an event permanently is still up.
//
// States:
// - Closed: Normal operation, calls pass through
// - Open: Too many failures, calls rejected immediately
// - HalfOpen: Cool-down elapsed, trying whether the sink recovered
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }

    /// Gauge encoding (0=Closed, 1=Open, 2=HalfOpen)
    pub fn as_gauge(self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Time to wait before trying again
    pub timeout: Duration,
    /// Successes needed to close the circuit from half-open
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    state: Arc<Mutex<BreakerState>>,
    config: CircuitBreakerConfig,
    metrics: Option<Arc<Metrics>>,
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("Circuit breaker is open")]
    CircuitOpen,

    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

impl<E: IsTransient> IsTransient for CircuitBreakerError<E> {
    fn is_transient(&self) -> bool {
        match self {
            // not retried until the cool-down elapses
            CircuitBreakerError::CircuitOpen => false,
            CircuitBreakerError::OperationFailed(e) => e.is_transient(),
        }
    }
}

impl CircuitBreaker {
    pub fn new(name: &str, config: CircuitBreakerConfig) -> Self {
        Self {
            name: Arc::from(name),
            state: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at: None,
            })),
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        metrics.update_circuit_breaker_state(&self.name, CircuitState::Closed.as_gauge());
        self.metrics = Some(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute an operation with circuit breaker protection
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: IsTransient,
    {
        {
            let mut state = self.state.lock().await;

            if state.state == CircuitState::Open {
                let cooled_down = state
                    .opened_at
                    .map(|opened| opened.elapsed() >= self.config.timeout)
                    .unwrap_or(true);
                if !cooled_down {
                    return Err(CircuitBreakerError::CircuitOpen);
                }
                self.transition(&mut state, CircuitState::HalfOpen);
                state.success_count = 0;
            }
        }

        match operation.await {
            Ok(result) => {
                self.record_success().await;
                Ok(result)
            }
            Err(err) if err.is_transient() => {
                self.record_failure().await;
                Err(CircuitBreakerError::OperationFailed(err))
            }
            Err(err) => {
                // the sink answered, it just refused this event
                self.record_success().await;
                Err(CircuitBreakerError::OperationFailed(err))
            }
        }
    }

    async fn record_success(&self) {
        let mut state = self.state.lock().await;

        match state.state {
            CircuitState::HalfOpen => {
                state.success_count += 1;
                if state.success_count >= self.config.success_threshold {
                    self.transition(&mut state, CircuitState::Closed);
                    state.failure_count = 0;
                    state.success_count = 0;
                    state.opened_at = None;
                }
            }
            CircuitState::Closed => {
                state.failure_count = 0;
            }
            CircuitState::Open => {
                tracing::warn!(sink = %self.name, "Success recorded while circuit is open");
            }
        }
    }

    async fn record_failure(&self) {
        let mut state = self.state.lock().await;

        state.failure_count += 1;

        match state.state {
            CircuitState::Closed => {
                if state.failure_count >= self.config.failure_threshold {
                    self.transition(&mut state, CircuitState::Open);
                    state.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                self.transition(&mut state, CircuitState::Open);
                state.opened_at = Some(Instant::now());
                state.success_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    fn transition(&self, state: &mut BreakerState, to: CircuitState) {
        let from = state.state;
        state.state = to;

        match to {
            CircuitState::Open => tracing::warn!(
                sink = %self.name,
                failures = state.failure_count,
                "Circuit breaker opening"
            ),
            _ => tracing::info!(
                sink = %self.name,
                from = from.as_str(),
                to = to.as_str(),
                "Circuit breaker state change"
            ),
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_circuit_breaker_transition(&self.name, from.as_str(), to.as_str());
            metrics.update_circuit_breaker_state(&self.name, to.as_gauge());
        }
    }

    pub async fn get_state(&self) -> CircuitState {
        self.state.lock().await.state
    }

    pub async fn get_failure_count(&self) -> u32 {
        self.state.lock().await.failure_count
    }
}
