//! Type-safe wrappers for protocol primitives.
//!
//! These newtypes keep command type names, instance identifiers and queue
//! addresses from being mixed up even though several of them are strings
//! underneath.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// Identifier of a message type, shared by every node of the cluster.
///
/// The identifier is opaque: two nodes agree on a type only if they produce
/// byte-identical identifiers. Backed by `Arc<str>` because the same id is
/// cloned into windows, claims and redirect entries on every conflict.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTypeId(Arc<str>);

impl CommandTypeId {
    /// Create a new identifier.
    pub fn new(value: impl AsRef<str>) -> Self {
        CommandTypeId(Arc::from(value.as_ref()))
    }

    /// Borrow the raw identifier.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CommandTypeId {
    fn from(value: &str) -> Self {
        CommandTypeId::new(value)
    }
}

impl From<String> for CommandTypeId {
    fn from(value: String) -> Self {
        CommandTypeId(Arc::from(value))
    }
}

impl Borrow<str> for CommandTypeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CommandTypeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a running process.
///
/// Generated once at startup and never reused, so a restarted node is a new
/// instance even if it keeps its queue address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    /// Generate a fresh random instance id.
    pub fn generate() -> Self {
        InstanceId(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[inline]
    pub const fn value(self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for InstanceId {
    fn from(value: Uuid) -> Self {
        InstanceId(value)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of a directly reachable queue (a node's instance-specific queue).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueAddress(Arc<str>);

impl QueueAddress {
    /// Create a new queue address.
    pub fn new(value: impl AsRef<str>) -> Self {
        QueueAddress(Arc::from(value.as_ref()))
    }

    /// Borrow the raw address.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether the address is blank.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for QueueAddress {
    fn from(value: &str) -> Self {
        QueueAddress::new(value)
    }
}

impl From<String> for QueueAddress {
    fn from(value: String) -> Self {
        QueueAddress(Arc::from(value))
    }
}

impl Borrow<str> for QueueAddress {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
