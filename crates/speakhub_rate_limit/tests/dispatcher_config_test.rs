//! Tests for dispatcher configuration parsing.

use speakhub_rate_limit::{DispatcherConfig, DispatcherConfigBuilder};
use std::time::Duration;

#[test]
fn test_empty_table_uses_defaults() {
    let config: DispatcherConfig = toml::from_str("").unwrap();
    assert_eq!(config, DispatcherConfig::default());
    assert_eq!(config.max_attempts(), &5);
    assert_eq!(config.max_retries(), 4);
    assert_eq!(config.submit_timeout(), Duration::from_secs(60));
}

#[test]
fn test_partial_override() {
    let config: DispatcherConfig = toml::from_str(
        r#"
        lifecycle_per_second = 1
        max_attempts = 2
        idempotency_window_secs = 30
        "#,
    )
    .unwrap();

    assert_eq!(config.lifecycle_per_second(), &1);
    assert_eq!(config.max_retries(), 1);
    assert_eq!(config.idempotency_window(), Duration::from_secs(30));
    assert_eq!(config.move_burst(), &10);
}

#[test]
fn test_builder_and_setters() {
    let config = DispatcherConfigBuilder::default()
        .max_attempts(1u32)
        .build()
        .unwrap()
        .with_submit_timeout_secs(5);

    assert_eq!(config.max_retries(), 0);
    assert_eq!(config.submit_timeout(), Duration::from_secs(5));
}
