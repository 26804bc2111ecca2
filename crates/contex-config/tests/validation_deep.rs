// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deep validation tests for `contex-config`.

use contex_config::{ConfigError, ConfigWarning, ContexConfig, merge_configs, parse_toml, validate_config};

/// Fully-specified config with no validation warnings.
fn fully_valid_config() -> ContexConfig {
    ContexConfig {
        bind: "0.0.0.0:8099".into(),
        log_level: "info".into(),
        similarity_threshold: 0.3,
        event_ring_capacity: 1024,
        agent_queue_capacity: 256,
        embedding_dimensions: 384,
        embedding_timeout_secs: 30,
        webhook_timeout_secs: 10,
        webhook_retry_backoff_secs: vec![1, 4, 16],
        broker_timeout_secs: 2,
        embedding_endpoint: Some("https://embed.example.com".into()),
    }
}

fn validation_reasons(err: ConfigError) -> Vec<String> {
    match err {
        ConfigError::ValidationError { reasons } => reasons,
        other => panic!("expected ValidationError, got {other:?}"),
    }
}

#[test]
fn fully_valid_config_has_no_warnings() {
    let cfg = fully_valid_config();
    let warnings = validate_config(&cfg).expect("should be valid");
    assert!(warnings.is_empty());
}

#[test]
fn threshold_at_boundaries_is_valid() {
    for t in [-1.0_f32, 0.0, 1.0] {
        let cfg = ContexConfig {
            similarity_threshold: t,
            ..fully_valid_config()
        };
        validate_config(&cfg).unwrap_or_else(|_| panic!("threshold {t} should be valid"));
    }
}

#[test]
fn threshold_just_outside_boundaries_is_invalid() {
    for t in [-1.0001_f32, 1.0001] {
        let cfg = ContexConfig {
            similarity_threshold: t,
            ..fully_valid_config()
        };
        assert!(validate_config(&cfg).is_err(), "threshold {t} should be invalid");
    }
}

#[test]
fn nan_threshold_reported_distinctly() {
    let cfg = ContexConfig {
        similarity_threshold: f32::NAN,
        ..fully_valid_config()
    };
    let reasons = validation_reasons(validate_config(&cfg).unwrap_err());
    assert!(reasons.iter().any(|r| r.contains("finite")));
}

#[test]
fn multiple_hard_errors_all_accumulate() {
    let cfg = ContexConfig {
        log_level: "verbose".into(),
        event_ring_capacity: 0,
        agent_queue_capacity: 0,
        ..fully_valid_config()
    };
    let reasons = validation_reasons(validate_config(&cfg).unwrap_err());
    assert!(reasons.len() >= 3);
}

#[test]
fn missing_embedding_endpoint_warns_but_does_not_error() {
    let cfg = ContexConfig {
        embedding_endpoint: None,
        ..fully_valid_config()
    };
    let warnings = validate_config(&cfg).expect("missing endpoint is advisory only");
    assert!(
        warnings
            .iter()
            .any(|w| matches!(w, ConfigWarning::MissingOptionalField { field, .. } if field == "embedding_endpoint"))
    );
}

#[test]
fn partial_toml_overlay_fills_defaults() {
    let toml_str = r#"
        similarity_threshold = 0.5
    "#;
    let cfg = parse_toml(toml_str).unwrap();
    assert_eq!(cfg.similarity_threshold, 0.5);
    assert_eq!(cfg.bind, ContexConfig::default().bind);
}

#[test]
fn merge_chain_overlay_wins_end_to_end() {
    let base = fully_valid_config();
    let overlay = ContexConfig {
        bind: "127.0.0.1:1".into(),
        embedding_endpoint: None,
        ..fully_valid_config()
    };
    let merged = merge_configs(base, overlay);
    assert_eq!(merged.bind, "127.0.0.1:1");
    // overlay had no endpoint, so base's is preserved.
    assert_eq!(merged.embedding_endpoint.as_deref(), Some("https://embed.example.com"));
}

#[test]
fn negative_timeout_is_unparsable_not_a_validation_error() {
    // u64 fields cannot hold negative values — TOML parsing itself rejects them.
    let toml_str = r#"webhook_timeout_secs = -1"#;
    let err = parse_toml(toml_str).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
}
