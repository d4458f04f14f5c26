//! Configuration for the gated transport.

use std::time::Duration;

use crate::status::StatusLogRule;

/// Default minimum spacing between PLC operations, in milliseconds.
pub const DEFAULT_COMMUNICATION_INTERVAL_MS: u64 = 100;

/// Default number of attempts per operation.
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// Default initial capacity of the communication log.
pub const DEFAULT_LOG_CAPACITY: usize = 1024;

/// Settings for a [`GatedTransport`](crate::GatedTransport).
///
/// With the `serde` feature enabled this can be loaded from any serde
/// format; missing fields take their defaults.
///
/// # Example
///
/// ```
/// use s7_gate::{StatusLogRule, TransportConfig};
/// use std::time::Duration;
///
/// let config = TransportConfig::default()
///     .with_communication_interval(Duration::from_millis(50))
///     .with_retry_count(5)
///     .with_status_log_rule(StatusLogRule::LogOnlyOnChange);
///
/// assert_eq!(config.communication_interval(), Duration::from_millis(50));
/// assert_eq!(config.retry_count, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TransportConfig {
    /// Minimum spacing between the end of one operation and the start of the
    /// next, in milliseconds.
    pub communication_interval_ms: u64,
    /// Attempts per operation when the caller does not give a budget.
    pub retry_count: u32,
    /// Whether caller-supplied descriptions are added to write annotations.
    pub log_description: bool,
    /// Logging policy for status reads that do not name one.
    pub status_log_rule: StatusLogRule,
    /// How long an operation may wait for the gate, in milliseconds. `None`
    /// waits indefinitely.
    pub gate_timeout_ms: Option<u64>,
    /// Initial capacity of the communication log.
    pub log_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            communication_interval_ms: DEFAULT_COMMUNICATION_INTERVAL_MS,
            retry_count: DEFAULT_RETRY_COUNT,
            log_description: false,
            status_log_rule: StatusLogRule::LogAll,
            gate_timeout_ms: None,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl TransportConfig {
    /// Returns the communication interval as a `Duration`.
    pub fn communication_interval(&self) -> Duration {
        Duration::from_millis(self.communication_interval_ms)
    }

    /// Returns the gate timeout as a `Duration`, if set.
    pub fn gate_timeout(&self) -> Option<Duration> {
        self.gate_timeout_ms.map(Duration::from_millis)
    }

    /// Sets the minimum spacing between operations.
    pub fn with_communication_interval(mut self, interval: Duration) -> Self {
        self.communication_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Sets the default attempt budget.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Enables or disables descriptions in write annotations.
    pub fn with_log_description(mut self, enabled: bool) -> Self {
        self.log_description = enabled;
        self
    }

    /// Sets the default status-read logging policy.
    pub fn with_status_log_rule(mut self, rule: StatusLogRule) -> Self {
        self.status_log_rule = rule;
        self
    }

    /// Bounds how long an operation waits for the gate.
    pub fn with_gate_timeout(mut self, timeout: Duration) -> Self {
        self.gate_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Sets the initial capacity of the communication log.
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }
}
