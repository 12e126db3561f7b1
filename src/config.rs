use crate::types::Dialect;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default TCP port of the Rotel IP control interface
pub const DEFAULT_PORT: u16 = 9590;

/// Client configuration
///
/// Every field has a default, so a partial document deserializes:
///
/// ```
/// use rotel_ip::ClientConfig;
///
/// let config: ClientConfig = serde_json::from_str(r#"{ "protocol_version": 1 }"#).unwrap();
/// assert_eq!(config.port, 9590);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Port used when `connect` is called without one
    pub port: u16,

    /// Dialect tried first
    pub protocol_version: Dialect,

    /// Switch dialect when a handshake stalls; otherwise retry the same one
    pub dialect_fallback: bool,

    /// Poll interval for version 2 connections
    pub poll_interval_ms: u64,

    /// Poll interval for legacy connections
    pub legacy_poll_interval_ms: u64,

    /// Maximum silence before a connection is considered stalled
    pub liveness_window_ms: u64,

    /// Reconnect delay after a transport error
    pub error_retry_delay_ms: u64,

    /// Reconnect delay after a stall
    pub stall_retry_delay_ms: u64,

    /// Depth of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            protocol_version: Dialect::V2,
            dialect_fallback: true,
            poll_interval_ms: 3000,
            legacy_poll_interval_ms: 5000,
            liveness_window_ms: 7500,
            error_retry_delay_ms: 5000,
            stall_retry_delay_ms: 1000,
            event_capacity: 64,
        }
    }
}

impl ClientConfig {
    /// Poll interval for connections speaking `dialect`
    pub fn poll_interval(&self, dialect: Dialect) -> Duration {
        let ms = match dialect {
            Dialect::V2 => self.poll_interval_ms,
            Dialect::Legacy => self.legacy_poll_interval_ms,
        };
        Duration::from_millis(ms.max(1))
    }

    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.liveness_window_ms)
    }

    pub fn error_retry_delay(&self) -> Duration {
        Duration::from_millis(self.error_retry_delay_ms)
    }

    pub fn stall_retry_delay(&self) -> Duration {
        Duration::from_millis(self.stall_retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_device_timings() {
        let config = ClientConfig::default();
        assert_eq!(config.poll_interval(Dialect::V2), Duration::from_secs(3));
        assert_eq!(config.poll_interval(Dialect::Legacy), Duration::from_secs(5));
        assert_eq!(config.liveness_window(), Duration::from_millis(7500));
        assert_eq!(config.error_retry_delay(), Duration::from_secs(5));
        assert_eq!(config.stall_retry_delay(), Duration::from_secs(1));
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{ "port": 9591, "protocol_version": 1 }"#).unwrap();
        assert_eq!(config.port, 9591);
        assert_eq!(config.protocol_version, Dialect::Legacy);
        assert!(config.dialect_fallback);
        assert_eq!(config.liveness_window_ms, 7500);
    }

    #[test]
    fn unknown_protocol_version_is_rejected() {
        let err = serde_json::from_str::<ClientConfig>(r#"{ "protocol_version": 3 }"#)
            .unwrap_err()
            .to_string();
        assert!(err.contains("Unsupported protocol version: 3"), "{}", err);
    }
}
