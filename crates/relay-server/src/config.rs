//! Server configuration.

use std::time::Duration;

use relay_settings::ServerSettings;

/// Runtime configuration for the relay server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Outbound queue length per connection.
    pub max_send_queue: usize,
    /// Interval between pings to each client.
    pub heartbeat_interval: Duration,
    /// Silence after which a client is swept.
    pub client_timeout: Duration,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// How long shutdown waits for background tasks.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_send_queue: 256,
            heartbeat_interval: Duration::from_secs(30),
            client_timeout: Duration::from_secs(90),
            max_message_size: 64 * 1024,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            max_send_queue: settings.max_send_queue,
            heartbeat_interval: Duration::from_secs(settings.heartbeat_interval_secs),
            client_timeout: Duration::from_secs(settings.client_timeout_secs),
            max_message_size: settings.max_message_size,
            shutdown_timeout: Duration::from_secs(settings.shutdown_timeout_secs),
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
