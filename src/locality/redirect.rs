//! Remote claimants, per command type.
//!
//! Every Claim received from a peer appends an entry to the type's list in
//! arrival order. Forwarding always uses the first entry; later entries are
//! dormant backups that take over when the entries ahead of them are
//! surrendered. Lists are never left empty: removing the last entry removes
//! the type, which puts it back to normal watch-and-count behavior.
//!
//! Two peers claiming the same type concurrently end up in different orders
//! on different listeners, so listeners may forward to different owners.
//! That is accepted; the table makes no attempt at a global tie-break.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::metrics;
use crate::types::{CommandTypeId, InstanceId, QueueAddress};

/// A known remote claimant of a command type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectEntry {
    pub command_type: CommandTypeId,
    pub destination: QueueAddress,
    pub owner: InstanceId,
}

/// Redirect table of this node.
#[derive(Debug, Default)]
pub struct RedirectTable {
    entries: DashMap<CommandTypeId, Vec<RedirectEntry>>,
}

impl RedirectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a claimant for a type. Returns the list length after the append.
    pub fn add(&self, entry: RedirectEntry) -> usize {
        let len = {
            let mut list = self.entries.entry(entry.command_type.clone()).or_default();
            list.push(entry);
            list.len()
        };
        metrics::set_redirected_types(self.entries.len());
        len
    }

    /// The entry messages of this type are forwarded to.
    pub fn first(&self, command_type: &str) -> Option<RedirectEntry> {
        self.entries
            .get(command_type)
            .and_then(|list| list.first().cloned())
    }

    pub fn contains(&self, command_type: &str) -> bool {
        self.entries.contains_key(command_type)
    }

    /// Remove all of `owner`'s entries for a type.
    ///
    /// Returns the number of entries removed. If the list becomes empty the
    /// type is removed from the table.
    pub fn remove(&self, command_type: &CommandTypeId, owner: InstanceId) -> usize {
        let removed = match self.entries.entry(command_type.clone()) {
            Entry::Occupied(mut occupied) => {
                let list = occupied.get_mut();
                let before = list.len();
                list.retain(|entry| entry.owner != owner);
                let removed = before - list.len();
                if list.is_empty() {
                    occupied.remove();
                }
                removed
            }
            Entry::Vacant(_) => 0,
        };
        metrics::set_redirected_types(self.entries.len());
        removed
    }

    /// Remove every entry owned by `owner`, across all types.
    ///
    /// Returns the types that no longer have any claimant.
    pub fn remove_owner(&self, owner: InstanceId) -> Vec<CommandTypeId> {
        let mut emptied = Vec::new();
        self.entries.retain(|command_type, list| {
            list.retain(|entry| entry.owner != owner);
            if list.is_empty() {
                emptied.push(command_type.clone());
                false
            } else {
                true
            }
        });
        metrics::set_redirected_types(self.entries.len());
        emptied
    }

    /// All entries of a type in forwarding order.
    pub fn entries_for(&self, command_type: &str) -> Vec<RedirectEntry> {
        self.entries
            .get(command_type)
            .map(|list| list.clone())
            .unwrap_or_default()
    }

    /// Number of redirected types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
