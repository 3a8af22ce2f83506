use rs2_signal::testing::LeakFixture;
use rs2_signal::{LeakEntry, LeakError, LeakRegistry, Stream, SubscribeOptions, TrackingKey};

fn key(name: &str) -> TrackingKey {
    TrackingKey::from_location(name, std::panic::Location::caller())
}

#[test]
fn test_registry_creation() {
    let registry = LeakRegistry::enabled();
    assert!(registry.is_enabled());
    assert_eq!(registry.outstanding(), 0);
    assert!(registry.validate().is_clean());
}

#[test]
fn test_increment_and_decrement() {
    let registry = LeakRegistry::enabled();
    let stream_key = key("stream");

    registry.increment(&stream_key);
    registry.increment(&stream_key);
    assert_eq!(registry.count(&stream_key), 2);
    assert_eq!(registry.outstanding(), 2);

    registry.decrement(&stream_key);
    assert_eq!(registry.count(&stream_key), 1);

    registry.decrement(&stream_key);
    assert_eq!(registry.count(&stream_key), 0);
    assert!(registry.validate().is_balanced());
}

#[test]
fn test_reset_zeroes_counts() {
    let registry = LeakRegistry::enabled();
    registry.increment(&key("a"));
    registry.increment(&key("b"));

    registry.reset();
    assert_eq!(registry.outstanding(), 0);
    assert!(registry.validate().is_clean());
}

#[test]
fn test_validate_lists_outstanding_keys_sorted() {
    let registry = LeakRegistry::enabled();
    let b = TrackingKey::from_location("b", std::panic::Location::caller());
    let a = TrackingKey::from_location("a", std::panic::Location::caller());
    registry.increment(&b);
    registry.increment(&a);
    registry.increment(&a);

    let report = registry.validate();
    assert!(!report.is_clean());
    assert_eq!(report.outstanding_total(), 3);
    let keys: Vec<&str> = report.outstanding.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec![a.as_str(), b.as_str()]);
    assert_eq!(report.outstanding[0].count, 2);
}

#[test]
fn test_negative_counts_are_surfaced() {
    let registry = LeakRegistry::enabled();
    let extra = key("extra");
    registry.decrement(&extra);

    let report = registry.validate();
    // Nothing outstanding, but the imbalance is reported
    assert!(report.is_clean());
    assert!(!report.is_balanced());
    assert_eq!(
        report.over_released,
        vec![LeakEntry {
            key: extra.as_str().to_string(),
            count: -1
        }]
    );

    assert!(report.clone().into_result().is_ok());
    match report.into_strict_result() {
        Err(LeakError::OverReleased { entries }) => assert_eq!(entries.len(), 1),
        other => panic!("expected over-release error, got {:?}", other),
    }
}

#[test]
fn test_disabled_registry_is_noop() {
    let registry = LeakRegistry::disabled();
    let k = key("stream");
    registry.increment(&k);
    registry.increment(&k);
    assert_eq!(registry.count(&k), 0);

    let stream: Stream<i32> = Stream::with_config(
        rs2_signal::StreamConfig::default().with_registry(registry.clone()),
    );
    let _sub = stream.subscribe(|_| {});
    assert!(registry.validate().is_balanced());
    stream.dispose();
    assert!(registry.validate().is_balanced());
}

#[test]
fn test_registry_clones_share_counts() {
    let registry = LeakRegistry::enabled();
    let clone = registry.clone();
    assert!(registry.same_registry(&clone));
    assert!(!registry.same_registry(&LeakRegistry::enabled()));

    clone.increment(&key("shared"));
    assert_eq!(registry.outstanding(), 1);
}

#[test]
fn test_tracking_key_names_call_site() {
    let k = TrackingKey::here("subscription");
    assert!(k.as_str().starts_with("subscription@"));
    assert!(k.as_str().contains("leak_registry_tests.rs"));
    assert_eq!(k.to_string(), k.as_str());
}

#[test]
fn test_outstanding_error_display() {
    let error = LeakError::Outstanding {
        entries: vec![
            LeakEntry {
                key: "stream@a.rs:1:1".to_string(),
                count: 2,
            },
            LeakEntry {
                key: "subscription@b.rs:2:5".to_string(),
                count: 1,
            },
        ],
    };
    assert_eq!(
        error.to_string(),
        "3 outstanding allocation(s) not released: stream@a.rs:1:1 (2), subscription@b.rs:2:5 (1)"
    );
    assert_eq!(error.entries().len(), 2);
}

#[test]
fn test_report_json() {
    let registry = LeakRegistry::enabled();
    registry.increment(&TrackingKey::from_location("stream", std::panic::Location::caller()));

    let json = registry.validate().to_json().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["outstanding"][0]["count"], 1);
    assert!(parsed["over_released"].as_array().unwrap().is_empty());
}

#[test]
fn test_fixture_reports_leaked_subscription() {
    let fixture = LeakFixture::new();
    let stream: Stream<i32> = Stream::with_config(fixture.config());
    let sub = stream.subscribe(|_| {});
    let weak = stream.subscribe_with(SubscribeOptions::weak(), |_| {});

    let report = fixture.report();
    assert_eq!(report.outstanding_total(), 2);
    let leaked: Vec<&LeakEntry> = report
        .outstanding
        .iter()
        .filter(|e| e.key.starts_with("subscription@"))
        .collect();
    // Only the strong subscription is tracked
    assert_eq!(leaked.len(), 1);
    assert!(leaked[0].key.contains("leak_registry_tests.rs"));

    sub.dispose();
    weak.dispose();
    stream.dispose();
    fixture.finish().unwrap();
}

#[test]
fn test_fixture_finish_fails_on_leak() {
    let fixture = LeakFixture::new();
    let stream: Stream<i32> = Stream::with_config(fixture.config());
    let registry = fixture.registry().clone();

    let error = fixture.finish().unwrap_err();
    assert!(matches!(error, LeakError::Outstanding { .. }));
    assert!(error.entries()[0].key.starts_with("stream@"));

    // finish() resets, so the late disposal shows up as an over-release
    drop(stream);
    assert!(!registry.validate().is_balanced());
}

#[test]
fn test_fixture_over_existing_registry_resets_it() {
    let registry = LeakRegistry::enabled();
    registry.increment(&key("stale"));

    let fixture = LeakFixture::with_registry(registry.clone());
    assert_eq!(fixture.registry().outstanding(), 0);
    fixture.finish().unwrap();
}
