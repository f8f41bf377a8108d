//! Configuration loading tests
//!
//! Environment variables are process-global, so these tests are serialized.

use serial_test::serial;

use funnelforge::config::{Config, LogFormat};
use funnelforge::error::AppError;

const ALL_VARS: &[&str] = &[
    "GENERATOR_API_KEY",
    "GENERATOR_BASE_URL",
    "DATABASE_PATH",
    "DATABASE_MAX_CONNECTIONS",
    "LOG_LEVEL",
    "LOG_FORMAT",
    "REQUEST_TIMEOUT_MS",
    "ORCHESTRATOR_BATCH_SIZE",
    "RATE_LIMIT_COOLDOWN_MS",
];

fn clear_env() {
    for var in ALL_VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults_with_only_api_key() {
    clear_env();
    std::env::set_var("GENERATOR_API_KEY", "key-123");

    let config = Config::from_env().unwrap();

    assert_eq!(config.generator.api_key, "key-123");
    assert_eq!(config.generator.base_url, "https://api.pagegen.dev");
    assert_eq!(config.database.max_connections, 5);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, LogFormat::Pretty);
    assert_eq!(config.request.timeout_ms, 60000);
    assert_eq!(config.orchestrator.batch_size, 5);
    assert_eq!(config.rate_limit.cooldown_ms, 30000);
}

#[test]
#[serial]
fn test_missing_api_key_is_config_error() {
    clear_env();

    let result = Config::from_env();
    assert!(matches!(result, Err(AppError::Config { .. })));
}

#[test]
#[serial]
fn test_overrides_take_effect() {
    clear_env();
    std::env::set_var("GENERATOR_API_KEY", "key-123");
    std::env::set_var("GENERATOR_BASE_URL", "http://localhost:9999");
    std::env::set_var("LOG_FORMAT", "json");
    std::env::set_var("ORCHESTRATOR_BATCH_SIZE", "3");
    std::env::set_var("RATE_LIMIT_COOLDOWN_MS", "1000");
    std::env::set_var("REQUEST_TIMEOUT_MS", "15000");

    let config = Config::from_env().unwrap();

    assert_eq!(config.generator.base_url, "http://localhost:9999");
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.orchestrator.batch_size, 3);
    assert_eq!(config.rate_limit.cooldown_ms, 1000);
    assert_eq!(config.request.timeout_ms, 15000);

    clear_env();
}

#[test]
#[serial]
fn test_unparseable_numbers_fall_back_to_defaults() {
    clear_env();
    std::env::set_var("GENERATOR_API_KEY", "key-123");
    std::env::set_var("ORCHESTRATOR_BATCH_SIZE", "not-a-number");
    std::env::set_var("DATABASE_MAX_CONNECTIONS", "");

    let config = Config::from_env().unwrap();

    assert_eq!(config.orchestrator.batch_size, 5);
    assert_eq!(config.database.max_connections, 5);

    clear_env();
}
