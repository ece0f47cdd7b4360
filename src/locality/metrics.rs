//! Prometheus metrics for the claim protocol.
//!
//! Metrics cover:
//! - Redirected (forwarded) messages
//! - Conflicts observed and claims issued per command type
//! - Surrenders sent and protocol messages received
//! - Broadcast fan-out outcomes and latency
//! - Table sizes (owned claims, redirected types, cluster members)
//!
//! All metrics are registered to a custom registry with the "commandeer"
//! prefix so they cannot collide with the host application's metrics.
//! Registration errors are logged and the metric keeps working unregistered
//! instead of panicking.
//!
//! Command type labels are bounded by the set of registered command types, so
//! cardinality is fixed at startup.

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Registry,
    TextEncoder, opts,
};
use tracing::warn;

/// Custom Prometheus registry for Commandeer metrics.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    Registry::new_custom(Some("commandeer".to_string()), None).unwrap_or_else(|_| Registry::new())
});

// =============================================================================
// Metric Declaration Macros
// =============================================================================

/// Declare an IntGauge metric.
macro_rules! define_gauge {
    ($name:ident, $metric_name:expr, $help:expr) => {
        #[doc = $help]
        pub static $name: Lazy<IntGauge> =
            Lazy::new(|| register_int_gauge_safe(&REGISTRY, $metric_name, $help));
    };
}

/// Declare an IntCounter metric (no labels).
macro_rules! define_counter {
    ($name:ident, $metric_name:expr, $help:expr) => {
        #[doc = $help]
        pub static $name: Lazy<IntCounter> =
            Lazy::new(|| register_int_counter_safe(&REGISTRY, $metric_name, $help));
    };
}

/// Declare an IntCounterVec metric with labels.
macro_rules! define_counter_vec {
    ($name:ident, $metric_name:expr, $help:expr, [$($label:expr),+ $(,)?]) => {
        #[doc = $help]
        pub static $name: Lazy<IntCounterVec> = Lazy::new(|| {
            register_int_counter_vec_safe(&REGISTRY, $metric_name, $help, &[$($label),+])
        });
    };
}

/// Declare a HistogramVec metric with labels and buckets.
macro_rules! define_histogram_vec {
    ($name:ident, $metric_name:expr, $help:expr, [$($label:expr),+ $(,)?], [$($bucket:expr),+ $(,)?]) => {
        #[doc = $help]
        pub static $name: Lazy<HistogramVec> = Lazy::new(|| {
            register_histogram_vec_safe(&REGISTRY, $metric_name, $help, &[$($label),+], vec![$($bucket),+])
        });
    };
}

// =============================================================================
// Interceptor metrics
// =============================================================================

define_counter!(
    REDIRECTED_MESSAGES,
    "redirected_messages_total",
    "Total number of messages forwarded to a remote claimant"
);
define_counter_vec!(
    CONFLICTS_OBSERVED,
    "conflicts_observed_total",
    "Total number of conflict signals observed from downstream handlers",
    ["command_type"]
);
define_counter_vec!(
    CLAIMS_ISSUED,
    "claims_issued_total",
    "Total number of claims issued by this node",
    ["command_type"]
);
define_counter_vec!(
    SURRENDERS_SENT,
    "surrenders_sent_total",
    "Total number of local claims surrendered",
    ["reason"]
);

// =============================================================================
// Protocol metrics
// =============================================================================

define_counter_vec!(
    PROTOCOL_MESSAGES_RECEIVED,
    "protocol_messages_received_total",
    "Total number of claim protocol messages received",
    ["kind", "origin"]
);
define_counter_vec!(
    BROADCAST_SENDS,
    "broadcast_sends_total",
    "Total number of direct protocol sends to cluster members",
    ["kind", "status"]
);
define_histogram_vec!(
    BROADCAST_DURATION,
    "broadcast_duration_seconds",
    "Time to fan a protocol message out to every member",
    ["kind"],
    [0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
);

// =============================================================================
// Table size metrics
// =============================================================================

define_gauge!(
    OWNED_CLAIMS,
    "owned_claims",
    "Number of command types currently claimed by this node"
);
define_gauge!(
    REDIRECTED_TYPES,
    "redirected_types",
    "Number of command types currently redirected to a remote claimant"
);
define_gauge!(
    CLUSTER_MEMBERS,
    "cluster_members",
    "Number of known cluster members"
);

// =============================================================================
// Recording helpers
// =============================================================================

/// Record one forwarded message.
pub fn record_redirect() {
    REDIRECTED_MESSAGES.inc();
}

/// Record a conflict signal for a command type.
pub fn record_conflict(command_type: &str) {
    CONFLICTS_OBSERVED.with_label_values(&[command_type]).inc();
}

/// Record a claim issued by this node.
pub fn record_claim(command_type: &str) {
    CLAIMS_ISSUED.with_label_values(&[command_type]).inc();
}

/// Record a surrendered claim. `reason` is "expired" or "shutdown".
pub fn record_surrender(reason: &str) {
    SURRENDERS_SENT.with_label_values(&[reason]).inc();
}

/// Record a received protocol message. `origin` is "local" for loop-back
/// echoes of this node's own messages and "remote" otherwise.
pub fn record_protocol_message(kind: &str, origin: &str) {
    PROTOCOL_MESSAGES_RECEIVED
        .with_label_values(&[kind, origin])
        .inc();
}

/// Record the outcome of one fan-out.
pub fn record_broadcast(kind: &str, succeeded: usize, failed: usize, duration_secs: f64) {
    if succeeded > 0 {
        BROADCAST_SENDS
            .with_label_values(&[kind, "success"])
            .inc_by(succeeded as u64);
    }
    if failed > 0 {
        BROADCAST_SENDS
            .with_label_values(&[kind, "failure"])
            .inc_by(failed as u64);
    }
    BROADCAST_DURATION
        .with_label_values(&[kind])
        .observe(duration_secs);
}

pub fn set_owned_claims(count: usize) {
    OWNED_CLAIMS.set(count as i64);
}

pub fn set_redirected_types(count: usize) {
    REDIRECTED_TYPES.set(count as i64);
}

pub fn set_cluster_members(count: usize) {
    CLUSTER_MEMBERS.set(count as i64);
}

// =============================================================================
// Registration
// =============================================================================

fn register_int_gauge_safe(registry: &Registry, name: &str, help: &str) -> IntGauge {
    let gauge = IntGauge::new(name, help).expect("metric name/help should be valid");
    match registry.register(Box::new(gauge.clone())) {
        Ok(()) => gauge,
        Err(e) => {
            warn!(
                name,
                error = %e,
                "Failed to register IntGauge metric, using unregistered fallback"
            );
            gauge
        }
    }
}

fn register_int_counter_safe(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("metric name/help should be valid");
    match registry.register(Box::new(counter.clone())) {
        Ok(()) => counter,
        Err(e) => {
            warn!(
                name,
                error = %e,
                "Failed to register IntCounter metric, using unregistered fallback"
            );
            counter
        }
    }
}

fn register_int_counter_vec_safe(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> IntCounterVec {
    let counter =
        IntCounterVec::new(opts!(name, help), labels).expect("metric opts should be valid");
    match registry.register(Box::new(counter.clone())) {
        Ok(()) => counter,
        Err(e) => {
            warn!(
                name,
                error = %e,
                "Failed to register IntCounterVec metric, using unregistered fallback"
            );
            counter
        }
    }
}

fn register_histogram_vec_safe(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
    buckets: Vec<f64>,
) -> HistogramVec {
    let histogram = HistogramVec::new(HistogramOpts::new(name, help).buckets(buckets), labels)
        .expect("histogram opts should be valid");
    match registry.register(Box::new(histogram.clone())) {
        Ok(()) => histogram,
        Err(e) => {
            warn!(
                name,
                error = %e,
                "Failed to register HistogramVec metric, using unregistered fallback"
            );
            histogram
        }
    }
}

/// Force registration of every metric so they show up before first use.
pub fn init_metrics() {
    let _ = &*REDIRECTED_MESSAGES;
    let _ = &*CONFLICTS_OBSERVED;
    let _ = &*CLAIMS_ISSUED;
    let _ = &*SURRENDERS_SENT;
    let _ = &*PROTOCOL_MESSAGES_RECEIVED;
    let _ = &*BROADCAST_SENDS;
    let _ = &*BROADCAST_DURATION;
    let _ = &*OWNED_CLAIMS;
    let _ = &*REDIRECTED_TYPES;
    let _ = &*CLUSTER_MEMBERS;
}

/// Encode all metrics in the Prometheus text exposition format.
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn gather_metrics() -> Vec<prometheus::proto::MetricFamily> {
    REGISTRY.gather()
}
