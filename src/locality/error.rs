//! Error types for the claim protocol.
//!
//! # Error Handling Patterns
//!
//! The interceptor sits in front of every business handler, so it has to be
//! careful about which failures it owns:
//!
//! ## Re-surface unchanged
//!
//! - A [`ConflictSignal`] below the claim threshold goes back to the caller as
//!   [`ClaimError::Conflict`] carrying the original signal, so the caller's own
//!   retry policy applies.
//! - Any other downstream failure goes back as [`ClaimError::Handler`] without
//!   being inspected or counted.
//!
//! ## Best-Effort (Log and Continue)
//!
//! - Claim/Surrender broadcast sends. A failed send to a stale peer is logged
//!   and counted; the peer disappears from the membership set once its
//!   liveness-dead signal arrives.
//!
//! ## Fail (the message was not handled anywhere)
//!
//! - Forwarding a redirected message. If the forward fails, nothing processed
//!   the message, so [`ClaimError::Transport`] is returned.

use thiserror::Error;

use crate::types::QueueAddress;

/// Result type for claim protocol operations.
pub type ClaimResult<T> = Result<T, ClaimError>;

/// Boxed error used for opaque downstream failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Optimistic-concurrency conflict raised by the persistence layer.
///
/// The interceptor only cares that a conflict happened; the stream and
/// versions are carried for logging and for the caller's retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Conflicting command on stream {stream}: expected version {expected_version}, found {actual_version}")]
pub struct ConflictSignal {
    /// Stream (aggregate) the command was applied to.
    pub stream: String,
    /// Version the command expected to write after.
    pub expected_version: i64,
    /// Version actually found in the store.
    pub actual_version: i64,
}

impl ConflictSignal {
    pub fn new(stream: impl Into<String>, expected_version: i64, actual_version: i64) -> Self {
        Self {
            stream: stream.into(),
            expected_version,
            actual_version,
        }
    }
}

/// Failure reported by the downstream (business) handler.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The command lost an optimistic-concurrency race.
    #[error(transparent)]
    Conflict(#[from] ConflictSignal),

    /// Anything else. Opaque to the claim protocol.
    #[error(transparent)]
    Failed(BoxError),
}

impl DispatchError {
    /// Wrap an arbitrary error as an opaque failure.
    pub fn failed<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DispatchError::Failed(Box::new(err))
    }
}

/// Errors raised by the transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Destination queue does not exist or cannot be reached.
    #[error("Destination {0} unreachable")]
    Unreachable(QueueAddress),

    /// The transport refused the message.
    #[error("Send rejected: {0}")]
    Rejected(String),

    /// The transport has been shut down.
    #[error("Transport closed")]
    Closed,
}

/// Errors surfaced to the message pipeline by the claim layer.
#[derive(Debug, Error)]
pub enum ClaimError {
    /// Conflict below the claim threshold, re-surfaced unchanged.
    #[error(transparent)]
    Conflict(ConflictSignal),

    /// Non-conflict downstream failure, propagated unmodified.
    #[error(transparent)]
    Handler(BoxError),

    /// Forwarding a redirected message failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A protocol envelope could not be decoded.
    #[error(transparent)]
    Protocol(#[from] crate::error::Error),
}

impl ClaimError {
    /// Returns true if this is a re-surfaced conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClaimError::Conflict(_))
    }

    /// The re-surfaced conflict, if any.
    pub fn as_conflict(&self) -> Option<&ConflictSignal> {
        match self {
            ClaimError::Conflict(signal) => Some(signal),
            _ => None,
        }
    }

    /// Returns a string label for metrics.
    pub fn as_metric_label(&self) -> &'static str {
        match self {
            ClaimError::Conflict(_) => "conflict",
            ClaimError::Handler(_) => "handler",
            ClaimError::Transport(_) => "transport",
            ClaimError::Protocol(_) => "protocol",
        }
    }
}

impl From<DispatchError> for ClaimError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Conflict(signal) => ClaimError::Conflict(signal),
            DispatchError::Failed(inner) => ClaimError::Handler(inner),
        }
    }
}
