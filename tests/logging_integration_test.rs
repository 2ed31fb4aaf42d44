//! Integration tests for logging functionality
//!
//! A global subscriber can only be installed once per process, so everything
//! touching `init_logging` lives in a single test.

use custodian::config::LoggingConfig;
use custodian::domain::CustodianError;
use custodian::logging::init_logging;
use tempfile::TempDir;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(config.local_enabled);
    assert_eq!(config.local_rotation, "daily");
}

#[test]
fn test_init_logging_with_file_output() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "never".to_string(),
    };

    assert!(matches!(
        init_logging("loud", &config),
        Err(CustodianError::Configuration(_))
    ));
    assert!(!log_path.exists());

    let guard = init_logging("debug", &config).unwrap();
    assert!(guard.has_file_output());
    assert!(log_path.is_dir());

    tracing::info!(record = "customer:1", "Logging integration test");

    let second = init_logging("info", &config);
    assert!(matches!(second, Err(CustodianError::Configuration(_))));

    drop(guard);
}
