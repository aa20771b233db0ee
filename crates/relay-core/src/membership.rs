//! Group membership index.
//!
//! Keeps both directions of the connection↔group relation so that a
//! disconnect can drop every membership without scanning all groups.
//! Empty groups are pruned; an absent group and an empty group are the same.

use std::collections::{HashMap, HashSet};

use crate::group::GroupKey;
use crate::ids::ConnectionId;

/// Bidirectional connection↔group index.
#[derive(Debug, Default)]
pub struct MembershipIndex {
    members: HashMap<GroupKey, HashSet<ConnectionId>>,
    held: HashMap<ConnectionId, HashSet<GroupKey>>,
}

impl MembershipIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `connection` to `group`.
    ///
    /// Returns `false` if the connection was already a member.
    pub fn join(&mut self, connection: &ConnectionId, group: &GroupKey) -> bool {
        let added = self
            .members
            .entry(group.clone())
            .or_default()
            .insert(connection.clone());
        if added {
            let _ = self
                .held
                .entry(connection.clone())
                .or_default()
                .insert(group.clone());
        }
        added
    }

    /// Remove `connection` from `group`.
    ///
    /// Returns `false` if it was not a member.
    pub fn leave(&mut self, connection: &ConnectionId, group: &GroupKey) -> bool {
        let Some(set) = self.members.get_mut(group) else {
            return false;
        };
        if !set.remove(connection) {
            return false;
        }
        if set.is_empty() {
            let _ = self.members.remove(group);
        }
        if let Some(groups) = self.held.get_mut(connection) {
            let _ = groups.remove(group);
            if groups.is_empty() {
                let _ = self.held.remove(connection);
            }
        }
        true
    }

    /// Snapshot of the members of `group`, possibly empty.
    pub fn members_of(&self, group: &GroupKey) -> Vec<ConnectionId> {
        self.members
            .get(group)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    fn is_member(&self, connection: &ConnectionId, group: &GroupKey) -> bool {
        self.members
            .get(group)
            .is_some_and(|set| set.contains(connection))
    }

    /// Groups currently held by `connection`.
    pub fn groups_of(&self, connection: &ConnectionId) -> Vec<GroupKey> {
        self.held
            .get(connection)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop every membership held by `connection`, returning the groups it left.
    pub fn remove_connection(&mut self, connection: &ConnectionId) -> Vec<GroupKey> {
        let Some(groups) = self.held.remove(connection) else {
            return Vec::new();
        };
        for group in &groups {
            if let Some(set) = self.members.get_mut(group) {
                let _ = set.remove(connection);
                if set.is_empty() {
                    let _ = self.members.remove(group);
                }
            }
        }
        groups.into_iter().collect()
    }

    #[cfg(test)]
    fn member_count(&self, group: &GroupKey) -> usize {
        self.members.get(group).map_or(0, HashSet::len)
    }

    /// Number of non-empty groups.
    pub fn group_count(&self) -> usize {
        self.members.len()
    }
}
