//! Per-type windows of recent conflict occurrences.
//!
//! Each command type owns an ordered deque of [`ConflictRecord`]s, oldest at
//! the head. Recording a conflict is one atomic DashMap entry update that
//! appends at the tail and then evicts expired records from the head, so the
//! cost is O(expired) rather than O(window).
//!
//! # Threshold race
//!
//! The size read that follows [`ConflictWindows::record`] is not part of the
//! same atomic step. Two concurrent conflicts on the same type can both see a
//! size at or above the threshold (one extra claim) or one can drain the
//! window just before the other reads it (a slightly late claim). Neither
//! can lose or reorder records.

use std::collections::VecDeque;
use std::time::Duration;

use dashmap::DashMap;

use super::clock::{Millis, age};
use crate::types::CommandTypeId;

/// One observed conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRecord {
    pub command_type: CommandTypeId,
    pub observed_at: Millis,
}

/// Conflict windows for all command types on this node.
#[derive(Debug)]
pub struct ConflictWindows {
    expire_after: Duration,
    windows: DashMap<CommandTypeId, VecDeque<ConflictRecord>>,
}

impl ConflictWindows {
    pub fn new(expire_after: Duration) -> Self {
        Self {
            expire_after,
            windows: DashMap::new(),
        }
    }

    pub fn expire_after(&self) -> Duration {
        self.expire_after
    }

    /// Append a conflict and evict the expired head of the window.
    ///
    /// Returns the window size right after this update. Callers comparing
    /// it against a threshold must tolerate the race described in the
    /// module docs.
    pub fn record(&self, command_type: &CommandTypeId, now: Millis) -> usize {
        let mut window = self.windows.entry(command_type.clone()).or_default();
        window.push_back(ConflictRecord {
            command_type: command_type.clone(),
            observed_at: now,
        });
        evict_expired(&mut window, now, self.expire_after);
        window.len()
    }

    /// Current size of a type's window (no eviction).
    pub fn len(&self, command_type: &str) -> usize {
        self.windows
            .get(command_type)
            .map(|window| window.len())
            .unwrap_or(0)
    }

    /// Remove and return a type's window.
    pub fn drain(&self, command_type: &str) -> Vec<ConflictRecord> {
        self.windows
            .remove(command_type)
            .map(|(_, window)| window.into_iter().collect())
            .unwrap_or_default()
    }

    /// Snapshot of a type's window, oldest first.
    pub fn snapshot(&self, command_type: &str) -> Vec<ConflictRecord> {
        self.windows
            .get(command_type)
            .map(|window| window.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of types with a non-drained window.
    pub fn tracked_types(&self) -> usize {
        self.windows.len()
    }
}

/// Pop records from the head while the oldest one is older than `expire_after`.
///
/// Stops at the first record still inside the window; everything behind it is
/// newer (records are appended in arrival order), so arrival order of the
/// survivors is preserved.
fn evict_expired(
    window: &mut VecDeque<ConflictRecord>,
    now: Millis,
    expire_after: Duration,
) -> usize {
    let mut evicted = 0;
    while let Some(head) = window.front() {
        if age(now, head.observed_at) > expire_after {
            window.pop_front();
            evicted += 1;
        } else {
            break;
        }
    }
    evicted
}
