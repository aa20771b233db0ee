//! Delivery seam between the dispatcher and the socket layer.

use std::sync::{Arc, OnceLock};

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::ids::ConnectionId;

/// One outbound notification: a named event and its payload.
///
/// The wire form is encoded at most once and shared by every recipient of a
/// fan-out.
#[derive(Debug)]
pub struct Delivery {
    event: String,
    payload: Value,
    encoded: OnceLock<Option<Arc<String>>>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    event: &'a str,
    data: &'a Value,
}

impl Delivery {
    /// Build a delivery.
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
            encoded: OnceLock::new(),
        }
    }

    /// Event name.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Event payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// JSON text frame `{"event": ..., "data": ...}`.
    ///
    /// Returns `None` if the payload cannot be serialized.
    pub fn encoded(&self) -> Option<Arc<String>> {
        self.encoded
            .get_or_init(|| {
                let envelope = Envelope {
                    event: &self.event,
                    data: &self.payload,
                };
                match serde_json::to_string(&envelope) {
                    Ok(json) => Some(Arc::new(json)),
                    Err(e) => {
                        warn!(event = %self.event, error = %e, "failed to encode delivery");
                        None
                    }
                }
            })
            .clone()
    }
}

/// Pushes deliveries to live connections.
///
/// Implementations must not block: delivery is fire-and-forget, and a
/// connection that no longer exists is a silent no-op.
pub trait Transport: Send + Sync {
    /// Hand `delivery` to `connection`. Returns `false` if it was dropped.
    fn send(&self, connection: &ConnectionId, delivery: &Delivery) -> bool;
}
