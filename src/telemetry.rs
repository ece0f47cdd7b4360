//! Logging configuration for Commandeer.
//!
//! All claim protocol decisions are emitted through `tracing` with structured
//! fields (`command_type`, `message_id`, `instance`, `destination`). This
//! module installs a subscriber for hosts that do not bring their own.
//!
//! # Basic Logging
//!
//! ```rust,no_run
//! use commandeer::telemetry::{LogFormat, init_logging};
//!
//! // Initialize pretty logging (default)
//! init_logging(LogFormat::Pretty).expect("Failed to init logging");
//! ```
//!
//! # Environment Variables
//!
//! - `LOG_FORMAT`: Set to `json` or `pretty` (default: `pretty`)
//! - `RUST_LOG`: Control log levels (default: `info`)
//!
//! Per-message decisions (pass-through, watch, below-threshold conflict) are
//! logged at `debug`; claims, surrenders and redirect table changes at
//! `info`; broadcast send failures at `warn`.

use tracing_subscriber::prelude::*;

use crate::types::{InstanceId, QueueAddress};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty-print format (default).
    #[default]
    Pretty,
    /// JSON format for log aggregators (Elasticsearch, Loki, etc.).
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        })
    }
}

impl LogFormat {
    /// Read from LOG_FORMAT environment variable.
    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT")
            .map(|s| s.parse().unwrap_or_default())
            .unwrap_or_default()
    }
}

/// Initialize logging with the specified format.
///
/// Log levels are controlled via the `RUST_LOG` environment variable and
/// default to `info`. Fails if a global subscriber is already installed.
pub fn init_logging(format: LogFormat) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
                .try_init()?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()?;
        }
    }

    Ok(())
}

/// Initialize logging using `LOG_FORMAT` from the environment.
pub fn init_logging_from_env() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging(LogFormat::from_env())
}

/// Span carrying the identity of the local node.
///
/// Hosts running several nodes in one process (tests, simulations) enter this
/// span around each node's work so log lines can be told apart.
pub fn node_span(queue: &QueueAddress, instance: InstanceId) -> tracing::Span {
    tracing::info_span!("node", queue = %queue, instance = %instance)
}
