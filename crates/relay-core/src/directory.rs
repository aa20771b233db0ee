//! Area directory: `(area, vendor) → connection`.
//!
//! An area is known while at least one vendor is registered in it. Removing
//! the last entry forgets the area, so the map only holds live entries.
//!
//! Entries are not indexed by connection; [`AreaDirectory::remove_connection`]
//! scans the whole directory. Disconnects are rare next to lookups.

use std::collections::HashMap;

use crate::ids::{AreaCode, ConnectionId, VendorId};

/// Vendor-targeted index over area memberships.
#[derive(Debug, Default)]
pub struct AreaDirectory {
    areas: HashMap<AreaCode, HashMap<VendorId, ConnectionId>>,
}

impl AreaDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Point `(area, vendor)` at `connection`, replacing any earlier session.
    ///
    /// Returns the connection that was displaced, if any.
    pub fn register(
        &mut self,
        area: &AreaCode,
        vendor: &VendorId,
        connection: &ConnectionId,
    ) -> Option<ConnectionId> {
        self.areas
            .entry(area.clone())
            .or_default()
            .insert(vendor.clone(), connection.clone())
    }

    /// Remove `(area, vendor)`, returning the connection it pointed at.
    pub fn unregister(&mut self, area: &AreaCode, vendor: &VendorId) -> Option<ConnectionId> {
        let vendors = self.areas.get_mut(area)?;
        let removed = vendors.remove(vendor);
        if vendors.is_empty() {
            let _ = self.areas.remove(area);
        }
        removed
    }

    /// Connection currently representing `vendor` in `area`.
    pub fn lookup(&self, area: &AreaCode, vendor: &VendorId) -> Option<ConnectionId> {
        self.areas.get(area)?.get(vendor).cloned()
    }

    /// Whether any vendor is registered in `area`.
    pub fn is_known(&self, area: &AreaCode) -> bool {
        self.areas.contains_key(area)
    }

    /// Number of areas with at least one registered vendor.
    pub fn area_count(&self) -> usize {
        self.areas.len()
    }

    /// Remove every entry owned by `connection`. Returns how many were removed.
    pub fn remove_connection(&mut self, connection: &ConnectionId) -> usize {
        let mut removed = 0;
        self.areas.retain(|_, vendors| {
            let before = vendors.len();
            vendors.retain(|_, owner| owner != connection);
            removed += before - vendors.len();
            !vendors.is_empty()
        });
        removed
    }

    /// Total number of `(area, vendor)` entries.
    pub fn entry_count(&self) -> usize {
        self.areas.values().map(HashMap::len).sum()
    }
}
