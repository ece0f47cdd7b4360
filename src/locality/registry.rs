//! Command types currently claimed by this node.
//!
//! Claims are kept in a deque ordered by start time, so the lazy sweep only
//! looks at the head. Concurrent claimers can read the clock and insert in
//! different orders, so inserts go to their sorted position rather than the
//! tail. There is at most one claim per command type: claiming
//! a type that is already owned restarts its lifetime.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;

use super::clock::{Millis, age};
use super::metrics;
use crate::types::CommandTypeId;

/// A claim owned by the local node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub command_type: CommandTypeId,
    pub started_at: Millis,
}

/// Local claim registry.
#[derive(Debug)]
pub struct ClaimRegistry {
    claim_length: Duration,
    owned: Mutex<VecDeque<Claim>>,
}

impl ClaimRegistry {
    pub fn new(claim_length: Duration) -> Self {
        Self {
            claim_length,
            owned: Mutex::new(VecDeque::new()),
        }
    }

    pub fn claim_length(&self) -> Duration {
        self.claim_length
    }

    /// Record a fresh claim started at `now`.
    ///
    /// An existing claim on the same type is replaced, which restarts its
    /// lifetime. Returns true if the type was not
    /// owned before.
    pub async fn claim(&self, command_type: &CommandTypeId, now: Millis) -> bool {
        let mut owned = self.owned.lock().await;
        let before = owned.len();
        owned.retain(|claim| &claim.command_type != command_type);
        let is_new = owned.len() == before;
        insert_ordered(
            &mut owned,
            Claim {
                command_type: command_type.clone(),
                started_at: now,
            },
        );
        metrics::set_owned_claims(owned.len());
        is_new
    }

    /// Insert a claim only if the type is not already owned.
    ///
    /// Used for loop-back echoes of this node's own Claim broadcast, which
    /// normally arrive after [`ClaimRegistry::claim`] already recorded it.
    pub async fn ensure(&self, command_type: &CommandTypeId, now: Millis) -> bool {
        let mut owned = self.owned.lock().await;
        if owned.iter().any(|claim| &claim.command_type == command_type) {
            return false;
        }
        insert_ordered(
            &mut owned,
            Claim {
                command_type: command_type.clone(),
                started_at: now,
            },
        );
        metrics::set_owned_claims(owned.len());
        true
    }

    /// Evict every claim whose age has reached the claim length.
    ///
    /// Returns the evicted claims, oldest first, so the caller can surrender
    /// them.
    pub async fn sweep_expired(&self, now: Millis) -> Vec<Claim> {
        let mut owned = self.owned.lock().await;
        let mut expired = Vec::new();
        while let Some(head) = owned.front() {
            if age(now, head.started_at) >= self.claim_length {
                if let Some(claim) = owned.pop_front() {
                    expired.push(claim);
                }
            } else {
                break;
            }
        }
        if !expired.is_empty() {
            metrics::set_owned_claims(owned.len());
        }
        expired
    }

    /// Remove every claim regardless of age.
    pub async fn drain_all(&self) -> Vec<Claim> {
        let mut owned = self.owned.lock().await;
        let drained: Vec<Claim> = owned.drain(..).collect();
        metrics::set_owned_claims(0);
        drained
    }

    pub async fn contains(&self, command_type: &str) -> bool {
        self.owned
            .lock()
            .await
            .iter()
            .any(|claim| claim.command_type.as_str() == command_type)
    }

    pub async fn len(&self) -> usize {
        self.owned.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.owned.lock().await.is_empty()
    }

    /// Snapshot of owned claims, oldest first.
    pub async fn snapshot(&self) -> Vec<Claim> {
        self.owned.lock().await.iter().cloned().collect()
    }
}

/// Insert after every claim started at or before `claim.started_at`.
fn insert_ordered(owned: &mut VecDeque<Claim>, claim: Claim) {
    let at = owned.partition_point(|existing| existing.started_at <= claim.started_at);
    owned.insert(at, claim);
}
