//! Tests for the metrics module.
//!
//! Metrics live in a process-global registry. Tests that read counters run
//! under `#[serial]` and assert on deltas, never on absolute values.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use commandeer::locality::metrics;
use commandeer::locality::{
    ClaimConfig, ClaimCoordinator, ClaimInterceptor, ConflictSignal, DispatchError,
    InboundMessage, LocalNetwork, ManualClock, MessageCatalog,
};
use commandeer::types::QueueAddress;
use serial_test::serial;

#[test]
fn test_metric_names_are_prefixed() {
    metrics::init_metrics();
    let names: Vec<String> = metrics::gather_metrics()
        .iter()
        .map(|family| family.get_name().to_string())
        .collect();
    assert!(!names.is_empty());
    assert!(names.iter().all(|name| name.starts_with("commandeer_")));
}

#[test]
fn test_encode_metrics_text_format() {
    metrics::init_metrics();
    metrics::record_claim("Shop.PlaceOrder");
    let encoded = metrics::encode_metrics().unwrap();
    assert!(encoded.contains("# HELP commandeer_claims_issued_total"));
    assert!(encoded.contains("command_type=\"Shop.PlaceOrder\""));
}

#[tokio::test]
#[serial]
async fn test_interceptor_records_conflicts_and_claims() {
    let network = LocalNetwork::new();
    network.attach("shop-b");
    let coordinator = Arc::new(
        ClaimCoordinator::with_clock(
            ClaimConfig::new("shop", "shop-a")
                .with_claim_threshold(2)
                .with_expire_conflict(Duration::from_secs(60)),
            MessageCatalog::new().register_command("Metrics.Command"),
            Arc::new(network.clone()),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap(),
    );
    coordinator.membership().add(QueueAddress::from("shop-b"));
    let interceptor = ClaimInterceptor::new(coordinator);

    let conflicts_before = metrics::CONFLICTS_OBSERVED
        .with_label_values(&["Metrics.Command"])
        .get();
    let claims_before = metrics::CLAIMS_ISSUED
        .with_label_values(&["Metrics.Command"])
        .get();

    let message = InboundMessage::new("Metrics.Command", Bytes::new());
    for _ in 0..2 {
        let _ = interceptor
            .intercept(&message, || async {
                Err(DispatchError::from(ConflictSignal::new("s", 0, 1)))
            })
            .await;
    }

    assert_eq!(
        metrics::CONFLICTS_OBSERVED
            .with_label_values(&["Metrics.Command"])
            .get(),
        conflicts_before + 2
    );
    assert_eq!(
        metrics::CLAIMS_ISSUED
            .with_label_values(&["Metrics.Command"])
            .get(),
        claims_before + 1
    );
}

#[test]
#[serial]
fn test_surrender_reasons_are_separate_series() {
    let expired_before = metrics::SURRENDERS_SENT
        .with_label_values(&["expired"])
        .get();
    let shutdown_before = metrics::SURRENDERS_SENT
        .with_label_values(&["shutdown"])
        .get();

    metrics::record_surrender("shutdown");

    assert_eq!(
        metrics::SURRENDERS_SENT.with_label_values(&["expired"]).get(),
        expired_before
    );
    assert_eq!(
        metrics::SURRENDERS_SENT
            .with_label_values(&["shutdown"])
            .get(),
        shutdown_before + 1
    );
}

#[test]
#[serial]
fn test_gauges_follow_latest_value() {
    metrics::set_cluster_members(3);
    assert_eq!(metrics::CLUSTER_MEMBERS.get(), 3);
    metrics::set_cluster_members(1);
    assert_eq!(metrics::CLUSTER_MEMBERS.get(), 1);
}
