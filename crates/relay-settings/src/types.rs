//! Settings types with compiled defaults.

use serde::{Deserialize, Serialize};

/// Root settings document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Listener and connection handling.
    pub server: ServerSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Listener and connection handling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Outbound queue length per connection; overflow is dropped.
    pub max_send_queue: usize,
    /// Seconds between WebSocket pings.
    pub heartbeat_interval_secs: u64,
    /// Seconds without a pong before a client is considered gone.
    pub client_timeout_secs: u64,
    /// Largest accepted inbound WebSocket message, in bytes.
    pub max_message_size: usize,
    /// Seconds to wait for in-flight work on shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3001,
            max_send_queue: 256,
            heartbeat_interval_secs: 30,
            client_timeout_secs: 90,
            max_message_size: 64 * 1024,
            shutdown_timeout_secs: 10,
        }
    }
}

/// Log output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggingSettings {
    /// Default level filter; `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let s = ServerSettings::default();
        assert_eq!(s.host, "0.0.0.0");
        assert_eq!(s.port, 3001);
        assert_eq!(s.max_send_queue, 256);
        assert_eq!(s.heartbeat_interval_secs, 30);
        assert_eq!(s.client_timeout_secs, 90);
        assert_eq!(s.max_message_size, 65_536);
    }

    #[test]
    fn logging_defaults() {
        let l = LoggingSettings::default();
        assert_eq!(l.level, "info");
        assert!(!l.json);
    }

    #[test]
    fn camel_case_keys() {
        let json = serde_json::to_value(RelaySettings::default()).unwrap();
        assert!(json["server"].get("maxSendQueue").is_some());
        assert!(json["server"].get("heartbeatIntervalSecs").is_some());
    }

    #[test]
    fn partial_document_fills_defaults() {
        let s: RelaySettings = serde_json::from_str(r#"{"server":{"port":4000}}"#).unwrap();
        assert_eq!(s.server.port, 4000);
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.logging, LoggingSettings::default());
    }
}
