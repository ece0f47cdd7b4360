//! Configuration for the claim protocol.
//!
//! ```rust
//! use std::time::Duration;
//! use commandeer::locality::ClaimConfig;
//!
//! let config = ClaimConfig::new("orders", "orders-node-a")
//!     .with_claim_threshold(3)
//!     .with_expire_conflict(Duration::from_secs(60))
//!     .with_claim_length(Duration::from_secs(120));
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Tuning
//!
//! | Option | Effect of raising it |
//! |--------|----------------------|
//! | `claim_threshold` | Fewer, later claims; more conflicts tolerated locally |
//! | `expire_conflict` | Sparse conflicts add up to a claim more easily |
//! | `claim_length` | Ownership is held longer before the lazy surrender |
//!
//! `claim_length` is only enforced when this node issues its next claim, so it
//! is a lower bound on how long a claim lives, not an upper bound.

use std::time::Duration;

use crate::constants::{
    DEFAULT_CLAIM_LENGTH_MS, DEFAULT_CLAIM_THRESHOLD, DEFAULT_COMMONALITY_REQUIRED,
    DEFAULT_ENDPOINT_NAME, DEFAULT_EXPIRE_CONFLICT_MS, MAX_CLAIM_THRESHOLD,
};
use crate::error::{Error, Result};
use crate::types::QueueAddress;

/// Configuration of one node's claim protocol participation.
#[derive(Debug, Clone)]
pub struct ClaimConfig {
    /// Number of conflicts within `expire_conflict` that triggers a claim.
    ///
    /// Default: 5
    pub claim_threshold: u32,

    /// Age after which a recorded conflict stops counting.
    ///
    /// Default: 30 seconds
    pub expire_conflict: Duration,

    /// How long a local claim lives before it is surrendered.
    ///
    /// Default: 60 seconds
    pub claim_length: Duration,

    /// Reserved policy input for future heuristics. Must lie in `[0, 1]`.
    ///
    /// Default: 0.9
    pub commonality_required: f64,

    /// Logical endpoint name of this node, sent in Claim/Surrender messages.
    pub endpoint: String,

    /// Direct-address queue of this node. Peers forward claimed commands here
    /// and send protocol messages here.
    pub instance_specific_queue: QueueAddress,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            claim_threshold: DEFAULT_CLAIM_THRESHOLD,
            expire_conflict: Duration::from_millis(DEFAULT_EXPIRE_CONFLICT_MS),
            claim_length: Duration::from_millis(DEFAULT_CLAIM_LENGTH_MS),
            commonality_required: DEFAULT_COMMONALITY_REQUIRED,
            endpoint: DEFAULT_ENDPOINT_NAME.to_string(),
            instance_specific_queue: QueueAddress::new(format!("{DEFAULT_ENDPOINT_NAME}-local")),
        }
    }
}

impl ClaimConfig {
    /// Create a config with default tuning for the given identity.
    pub fn new(
        endpoint: impl Into<String>,
        instance_specific_queue: impl Into<QueueAddress>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            instance_specific_queue: instance_specific_queue.into(),
            ..Default::default()
        }
    }

    pub fn with_claim_threshold(mut self, threshold: u32) -> Self {
        self.claim_threshold = threshold;
        self
    }

    pub fn with_expire_conflict(mut self, expire: Duration) -> Self {
        self.expire_conflict = expire;
        self
    }

    pub fn with_claim_length(mut self, length: Duration) -> Self {
        self.claim_length = length;
        self
    }

    pub fn with_commonality_required(mut self, commonality: f64) -> Self {
        self.commonality_required = commonality;
        self
    }

    /// Validate the configuration, returning every problem found.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.claim_threshold == 0 {
            errors.push("claim_threshold must be at least 1".to_string());
        }
        if self.claim_threshold > MAX_CLAIM_THRESHOLD {
            errors.push(format!(
                "claim_threshold ({}) must not exceed {}",
                self.claim_threshold, MAX_CLAIM_THRESHOLD
            ));
        }

        if self.expire_conflict.is_zero() {
            errors.push("expire_conflict must be greater than zero".to_string());
        }

        if self.claim_length.is_zero() {
            errors.push("claim_length must be greater than zero".to_string());
        }

        if !(0.0..=1.0).contains(&self.commonality_required) {
            errors.push(format!(
                "commonality_required ({}) must be between 0 and 1",
                self.commonality_required
            ));
        }

        if self.endpoint.trim().is_empty() {
            errors.push("endpoint must not be empty".to_string());
        }

        if self.instance_specific_queue.is_blank() {
            errors.push("instance_specific_queue must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and collapse all problems into one [`Error::Config`].
    pub fn validated(self) -> Result<Self> {
        self.validate()
            .map_err(|errors| Error::Config(errors.join("; ")))?;
        Ok(self)
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `CLAIM_THRESHOLD` | 5 |
    /// | `EXPIRE_CONFLICT_MS` | 30000 |
    /// | `CLAIM_LENGTH_MS` | 60000 |
    /// | `COMMONALITY_REQUIRED` | 0.9 |
    /// | `ENDPOINT_NAME` | `commandeer` |
    /// | `INSTANCE_SPECIFIC_QUEUE` | `<ENDPOINT_NAME>-<HOSTNAME>`, or `<ENDPOINT_NAME>-local` |
    ///
    /// Unparseable values are errors rather than silently defaulted, since a
    /// typo in a threshold would otherwise change cluster behavior unnoticed.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let claim_threshold: u32 =
            parse_env("CLAIM_THRESHOLD")?.unwrap_or(defaults.claim_threshold);

        let expire_conflict = parse_env::<u64>("EXPIRE_CONFLICT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.expire_conflict);

        let claim_length = parse_env::<u64>("CLAIM_LENGTH_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.claim_length);

        let commonality_required: f64 =
            parse_env("COMMONALITY_REQUIRED")?.unwrap_or(defaults.commonality_required);

        let endpoint = std::env::var("ENDPOINT_NAME").unwrap_or(defaults.endpoint);

        let instance_specific_queue = match std::env::var("INSTANCE_SPECIFIC_QUEUE") {
            Ok(queue) => QueueAddress::from(queue),
            Err(_) => match std::env::var("HOSTNAME") {
                Ok(host) if !host.trim().is_empty() => {
                    QueueAddress::new(format!("{}-{}", endpoint, host.trim()))
                }
                _ => QueueAddress::new(format!("{}-local", endpoint)),
            },
        };

        Self {
            claim_threshold,
            expire_conflict,
            claim_length,
            commonality_required,
            endpoint,
            instance_specific_queue,
        }
        .validated()
    }
}

fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(None),
    }
}
