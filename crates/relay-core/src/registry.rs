//! Live connection registry.

use std::collections::HashSet;

use crate::ids::ConnectionId;

/// Tracks which connections are currently open.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    live: HashSet<ConnectionId>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate and record a fresh connection id.
    pub fn open(&mut self) -> ConnectionId {
        let id = ConnectionId::new();
        let _ = self.live.insert(id.clone());
        id
    }

    /// Forget a connection. Returns `false` if it was not open.
    pub fn close(&mut self, connection: &ConnectionId) -> bool {
        self.live.remove(connection)
    }

    /// Whether `connection` is open.
    pub fn is_live(&self, connection: &ConnectionId) -> bool {
        self.live.contains(connection)
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether no connection is open.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
