//! Crate & protocol level errors.
//!
//! # Error Hierarchy
//!
//! The crate uses a two-layer error hierarchy:
//!
//! ## Protocol Layer (`crate::error`)
//!
//! - [`Error`]: configuration problems and protocol envelope encoding/decoding
//!
//! ## Claim Layer (`crate::locality::error`)
//!
//! - [`ClaimError`]: what the interceptor and protocol handler report to the
//!   message pipeline (re-surfaced conflicts, downstream failures, transport
//!   failures)
//!
//! ## Conversion
//!
//! [`Error`] converts into [`ClaimError`] via `From`, so envelope problems
//! propagate through the claim layer with `?`.
//!
//! [`ClaimError`]: crate::locality::ClaimError

use std::result;
use thiserror::Error as ThisError;

pub type Result<T> = result::Result<T, Error>;

/// Configuration and protocol envelope errors.
#[derive(Clone, Debug, ThisError, PartialEq, Eq)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required envelope header was absent.
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    /// The envelope names a type that is not a protocol message.
    #[error("Not a protocol message: {0}")]
    NotProtocolMessage(String),

    /// The envelope body could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Codec(err.to_string())
    }
}
