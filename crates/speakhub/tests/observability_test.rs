//! Tests for subscriber configuration.

use speakhub::observability::ObservabilityConfig;

#[test]
fn test_config_builder() {
    let config = ObservabilityConfig::new("voice")
        .with_version("1.2.3")
        .with_log_level("debug")
        .with_json_logs(true);

    assert_eq!(config.service_name, "voice");
    assert_eq!(config.service_version, "1.2.3");
    assert_eq!(config.log_level, "debug");
    assert!(config.json_logs);
}

#[test]
fn test_default_names_the_package() {
    let config = ObservabilityConfig::default();

    assert_eq!(config.service_name, "speakhub");
    assert_eq!(config.log_level, "info");
    assert!(!config.json_logs);
}
