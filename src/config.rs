use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

use crate::notifications::dead_letter::DEFAULT_DEAD_LETTER_CAPACITY;
use crate::notifications::subscriber::DEFAULT_FINISHED_WINDOW;
use crate::utils::{CircuitBreakerConfig, RetryConfig};

// ============================================================================
// Application Configuration
// ============================================================================
//
// Defaults, then an optional JSON file named by LOADER_DISPATCH_CONFIG, then
// environment overrides. Missing file fields keep their defaults.
//
// ============================================================================

pub const CONFIG_PATH_ENV: &str = "LOADER_DISPATCH_CONFIG";
pub const METRICS_PORT_ENV: &str = "LOADER_DISPATCH_METRICS_PORT";
pub const REDIS_URL_ENV: &str = "LOADER_DISPATCH_REDIS_URL";
pub const NOTIFICATIONS_ENV: &str = "LOADER_DISPATCH_NOTIFICATIONS";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Used when RUST_LOG is not set
    pub log_filter: String,
    pub metrics_port: u16,

    /// When off, lifecycle events are dropped at the store
    pub notifications_enabled: bool,
    /// Redis sink is only wired when set
    pub redis_url: Option<String>,
    pub redis_channel: String,
    pub broadcast_capacity: usize,
    pub dead_letter_capacity: usize,
    /// Finished orders a live subscriber remembers for dedupe
    pub subscriber_finished_window: usize,

    /// Clock-skew tolerance for orders scheduled "now"
    pub schedule_grace_secs: i64,

    pub retry_max_attempts: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub retry_multiplier: f64,

    pub breaker_failure_threshold: u32,
    pub breaker_timeout_secs: u64,
    pub breaker_success_threshold: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_filter: "info,loader_dispatch=debug".to_string(),
            metrics_port: 9090,
            notifications_enabled: true,
            redis_url: None,
            redis_channel: "order-lifecycle".to_string(),
            broadcast_capacity: 1024,
            dead_letter_capacity: DEFAULT_DEAD_LETTER_CAPACITY,
            subscriber_finished_window: DEFAULT_FINISHED_WINDOW,
            schedule_grace_secs: 60,
            retry_max_attempts: 3,
            retry_initial_delay_ms: 100,
            retry_max_delay_ms: 10_000,
            retry_multiplier: 2.0,
            breaker_failure_threshold: 5,
            breaker_timeout_secs: 30,
            breaker_success_threshold: 2,
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {}", path))?;
                Self::from_json(&raw).with_context(|| format!("Invalid config file {}", path))?
            }
            Err(_) => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(METRICS_PORT_ENV) {
            self.metrics_port = port
                .parse()
                .with_context(|| format!("{} must be a port number, got {:?}", METRICS_PORT_ENV, port))?;
        }
        if let Some(url) = lookup(REDIS_URL_ENV) {
            self.redis_url = if url.is_empty() { None } else { Some(url) };
        }
        if let Some(enabled) = lookup(NOTIFICATIONS_ENV) {
            self.notifications_enabled = enabled
                .parse()
                .with_context(|| format!("{} must be true or false, got {:?}", NOTIFICATIONS_ENV, enabled))?;
        }
        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry_max_attempts.max(1),
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            multiplier: self.retry_multiplier,
        }
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker_failure_threshold.max(1),
            timeout: Duration::from_secs(self.breaker_timeout_secs),
            success_threshold: self.breaker_success_threshold.max(1),
        }
    }

    pub fn schedule_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.schedule_grace_secs.max(0))
    }
}
