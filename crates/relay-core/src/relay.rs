//! Process-wide membership state.
//!
//! [`Relay`] owns the connection registry, the membership index and the area
//! directory behind a single lock. Every mutation, including the two-part
//! area join/leave and the disconnect cascade, is applied atomically.
//! Reads copy a snapshot out and release the lock before any delivery.

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use crate::directory::AreaDirectory;
use crate::group::GroupKey;
use crate::ids::{AreaCode, ConnectionId, VendorId};
use crate::membership::MembershipIndex;
use crate::registry::ConnectionRegistry;

#[derive(Debug, Default)]
struct RelayState {
    registry: ConnectionRegistry,
    index: MembershipIndex,
    directory: AreaDirectory,
}

/// What a disconnect cleaned up.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Disconnected {
    /// Groups the connection was removed from.
    pub groups: Vec<GroupKey>,
    /// Area directory entries that pointed at the connection.
    pub area_entries: usize,
}

/// Counters for health reporting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    /// Open connections.
    pub connections: usize,
    /// Non-empty groups.
    pub groups: usize,
    /// Areas with at least one registered vendor.
    pub areas: usize,
    /// `(area, vendor)` directory entries.
    pub area_entries: usize,
}

/// Shared membership-and-routing state.
#[derive(Debug, Default)]
pub struct Relay {
    state: RwLock<RelayState>,
}

impl Relay {
    /// Create an empty relay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and return its id.
    pub fn on_connect(&self) -> ConnectionId {
        let id = self.state.write().registry.open();
        debug!(conn_id = %id, "connection opened");
        id
    }

    /// Drop a connection with all its memberships and directory entries.
    ///
    /// Returns `None` if the connection was already gone.
    pub fn on_disconnect(&self, connection: &ConnectionId) -> Option<Disconnected> {
        let summary = {
            let mut state = self.state.write();
            if !state.registry.close(connection) {
                return None;
            }
            Disconnected {
                groups: state.index.remove_connection(connection),
                area_entries: state.directory.remove_connection(connection),
            }
        };
        info!(
            conn_id = %connection,
            groups = summary.groups.len(),
            area_entries = summary.area_entries,
            "connection closed"
        );
        Some(summary)
    }

    /// Whether `connection` is open.
    pub fn is_connected(&self, connection: &ConnectionId) -> bool {
        self.state.read().registry.is_live(connection)
    }

    /// Add `connection` to `group`.
    ///
    /// Returns `false` if the connection was already a member or is not open.
    pub fn join(&self, connection: &ConnectionId, group: &GroupKey) -> bool {
        let mut state = self.state.write();
        if !state.registry.is_live(connection) {
            debug!(conn_id = %connection, %group, "join from closed connection ignored");
            return false;
        }
        state.index.join(connection, group)
    }

    /// Remove `connection` from `group`. Returns `false` if it was not a member.
    pub fn leave(&self, connection: &ConnectionId, group: &GroupKey) -> bool {
        self.state.write().index.leave(connection, group)
    }

    /// Join `area:<area>` and register `connection` as `vendor`'s session there.
    ///
    /// Returns the connection displaced from the directory entry, if any.
    pub fn join_vendor_area(
        &self,
        connection: &ConnectionId,
        area: &AreaCode,
        vendor: &VendorId,
    ) -> Option<ConnectionId> {
        let mut state = self.state.write();
        if !state.registry.is_live(connection) {
            debug!(conn_id = %connection, %area, %vendor, "area join from closed connection ignored");
            return None;
        }
        let _ = state.index.join(connection, &GroupKey::Area(area.clone()));
        state.directory.register(area, vendor, connection)
    }

    /// Leave `area:<area>` and drop the `(area, vendor)` directory entry.
    pub fn leave_vendor_area(&self, connection: &ConnectionId, area: &AreaCode, vendor: &VendorId) {
        let mut state = self.state.write();
        let _ = state.index.leave(connection, &GroupKey::Area(area.clone()));
        let _ = state.directory.unregister(area, vendor);
    }

    /// Snapshot of the members of `group`.
    pub fn members_of(&self, group: &GroupKey) -> Vec<ConnectionId> {
        self.state.read().index.members_of(group)
    }

    /// Groups currently held by `connection`.
    pub fn groups_of(&self, connection: &ConnectionId) -> Vec<GroupKey> {
        self.state.read().index.groups_of(connection)
    }

    /// Connection currently representing `vendor` in `area`.
    pub fn lookup(&self, area: &AreaCode, vendor: &VendorId) -> Option<ConnectionId> {
        self.state.read().directory.lookup(area, vendor)
    }

    /// Resolve `vendors` against `area` under one read lock.
    ///
    /// Returns `None` if no vendor is registered in `area`; otherwise the
    /// vendors found, in request order.
    pub fn resolve_vendors(
        &self,
        area: &AreaCode,
        vendors: &[VendorId],
    ) -> Option<Vec<(VendorId, ConnectionId)>> {
        let state = self.state.read();
        if !state.directory.is_known(area) {
            return None;
        }
        Some(
            vendors
                .iter()
                .filter_map(|vendor| {
                    state
                        .directory
                        .lookup(area, vendor)
                        .map(|conn| (vendor.clone(), conn))
                })
                .collect(),
        )
    }

    /// Current counters.
    pub fn stats(&self) -> RelayStats {
        let state = self.state.read();
        RelayStats {
            connections: state.registry.len(),
            groups: state.index.group_count(),
            areas: state.directory.area_count(),
            area_entries: state.directory.entry_count(),
        }
    }
}
