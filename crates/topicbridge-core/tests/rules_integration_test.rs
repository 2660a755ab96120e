//! Integration tests for the settings → rule table → transformer pipeline
//!
//! Tests use temporary directories with real file fixtures to verify:
//! - Settings loading with a rule file next to it
//! - Rule precedence and skipping
//! - The extract → scale → timestamp stage order
//! - Per-message errors leaving the transformer usable

use std::sync::Arc;
use tempfile::TempDir;
use topicbridge_core::{Error, Outcome, RuleTable, Settings, Transformer};

const NOW: i64 = 1_700_000_000;

/// Write `bridge.yaml` and `rules.json` into a fresh directory.
fn setup_project(settings: &str, rules: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("bridge.yaml"), settings).unwrap();
    std::fs::write(dir.path().join("rules.json"), rules).unwrap();
    dir
}

fn load_transformer(dir: &TempDir) -> (Settings, Transformer) {
    let settings = Settings::load(dir.path().join("bridge.yaml")).unwrap();
    settings.validate().unwrap();
    let rules = RuleTable::load(&settings.rule_source().unwrap()).unwrap();
    let transformer = Transformer::new(Arc::new(rules), settings.transform_options());
    (settings, transformer)
}

fn published(outcome: Outcome) -> (String, String) {
    match outcome {
        Outcome::Publish { topic, payload } => (topic, String::from_utf8(payload).unwrap()),
        Outcome::Skip => panic!("Expected publish"),
    }
}

// =============================================================================
// Complete Pipeline Tests
// =============================================================================

#[test]
fn test_complete_pipeline_from_files() {
    let dir = setup_project(
        r#"
mqtt:
  topic: "shellies/#"
destination: linx/req
rules:
  file: rules.json
"#,
        r#"{
            "shellies/plug/relay/0/power": "energy/plug:0.001",
            "temperature": "climate/temperature",
            "rh": "climate/humidity->humidity",
            "meter": "energy/pv->power:0.001,0.5"
        }"#,
    );
    let (settings, transformer) = load_transformer(&dir);
    assert_eq!(settings.mqtt.topic, "shellies/#");
    assert_eq!(transformer.rules().len(), 4);

    let (topic, payload) = published(
        transformer
            .transform_at("shellies/plug/relay/0/power", b"1500", NOW)
            .unwrap(),
    );
    assert_eq!(topic, "linx/req/energy/plug");
    assert_eq!(payload, "1.5");

    let (topic, payload) = published(
        transformer
            .transform_at("shellies/ht/temperature", b"21.25", NOW)
            .unwrap(),
    );
    assert_eq!(topic, "linx/req/climate/temperature");
    assert_eq!(payload, "21.25");

    let (topic, payload) = published(
        transformer
            .transform_at("shellies/ht/rh", br#"{"humidity": 48, "battery": 90}"#, NOW)
            .unwrap(),
    );
    assert_eq!(topic, "linx/req/climate/humidity");
    assert_eq!(payload, "48");

    let (_, payload) = published(
        transformer
            .transform_at("shellies/em/meter", br#"{"power": 1000}"#, NOW)
            .unwrap(),
    );
    assert_eq!(payload, "1.5");

    assert_eq!(
        transformer
            .transform_at("shellies/ht/battery", b"90", NOW)
            .unwrap(),
        Outcome::Skip
    );
}

#[test]
fn test_pipeline_with_timestamp() {
    let dir = setup_project(
        "add_timestamp: true\nrules:\n  file: rules.json\n",
        r#"{"status": "devices/status", "power": "devices/power:2"}"#,
    );
    let (_, transformer) = load_transformer(&dir);

    let (topic, payload) = published(
        transformer
            .transform_at("dev/1/status", br#"{"online": true}"#, NOW)
            .unwrap(),
    );
    assert_eq!(topic, "devices/status");
    assert_eq!(payload, r#"{"online":true,"time":1700000000}"#);

    // Scaling yields a bare number, which cannot carry a timestamp.
    let err = transformer
        .transform_at("dev/1/power", b"3", NOW)
        .unwrap_err();
    assert!(err.is_payload());
}

#[test]
fn test_malformed_message_does_not_poison_later_ones() {
    let dir = setup_project(
        "rules:\n  file: rules.json\n",
        r#"{"sensor": "out->value"}"#,
    );
    let (_, transformer) = load_transformer(&dir);

    let err = transformer
        .transform_at("a/sensor", b"{broken", NOW)
        .unwrap_err();
    assert!(matches!(err, Error::Payload { .. }));

    let (_, payload) = published(
        transformer
            .transform_at("a/sensor", br#"{"value": "ok"}"#, NOW)
            .unwrap(),
    );
    assert_eq!(payload, "ok");
}

#[test]
fn test_inline_rules_in_settings() {
    let dir = setup_project(
        "rules:\n  inline: '{\"temp\": \"/absolute/temp\"}'\ndestination: ignored\n",
        "{}",
    );
    let (_, transformer) = load_transformer(&dir);
    let (topic, _) = published(transformer.transform_at("x/temp", b"1", NOW).unwrap());
    assert_eq!(topic, "/absolute/temp");
}

// =============================================================================
// Error Handling Hierarchy
// =============================================================================

#[test]
fn test_both_rule_sources_is_fatal() {
    let dir = setup_project(
        "rules:\n  inline: '{}'\n  file: rules.json\n",
        "{}",
    );
    let settings = Settings::load(dir.path().join("bridge.yaml")).unwrap();
    let err = settings.rule_source().unwrap_err();
    assert!(matches!(err, Error::ConfigInvalid { .. }));
    assert!(!err.is_payload());
}

#[test]
fn test_malformed_rule_file_is_fatal() {
    let dir = setup_project("rules:\n  file: rules.json\n", r#"{"temp": "out:"}"#);
    let settings = Settings::load(dir.path().join("bridge.yaml")).unwrap();
    let err = RuleTable::load(&settings.rule_source().unwrap()).unwrap_err();
    assert!(matches!(err, Error::InvalidRule { .. }));
}

#[test]
fn test_unparsable_rule_file_is_fatal() {
    let dir = setup_project("rules:\n  file: rules.json\n", "temp = out");
    let settings = Settings::load(dir.path().join("bridge.yaml")).unwrap();
    let err = RuleTable::load(&settings.rule_source().unwrap()).unwrap_err();
    assert!(matches!(err, Error::Json(_)));
}
