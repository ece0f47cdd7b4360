//! Known peer addresses, maintained by liveness broadcasts.
//!
//! The set has no expiry of its own: a member stays until its liveness-dead
//! signal arrives. Sends to a member that died without announcing it simply
//! fail at the transport until then.

use dashmap::DashSet;
use tracing::info;

use super::metrics;
use crate::types::QueueAddress;

/// Membership set of this node.
#[derive(Debug, Default)]
pub struct MembershipTracker {
    members: DashSet<QueueAddress>,
}

impl MembershipTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member. Returns false if it was already present.
    pub fn add(&self, address: QueueAddress) -> bool {
        let inserted = self.members.insert(address.clone());
        if inserted {
            info!(member = %address, "Cluster member joined");
            metrics::set_cluster_members(self.members.len());
        }
        inserted
    }

    /// Remove a member. Returns false if it was not present.
    pub fn remove(&self, address: &str) -> bool {
        let removed = self.members.remove(address).is_some();
        if removed {
            info!(member = %address, "Cluster member left");
            metrics::set_cluster_members(self.members.len());
        }
        removed
    }

    pub fn contains(&self, address: &str) -> bool {
        self.members.contains(address)
    }

    /// Snapshot of current members for broadcast fan-out.
    ///
    /// Members joining or leaving during the fan-out are picked up by the
    /// next broadcast.
    pub fn snapshot(&self) -> Vec<QueueAddress> {
        self.members.iter().map(|member| member.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
