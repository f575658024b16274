//! Unit tests for `GlobalConfig` parsing and validation.

use std::io::Write;
use std::time::Duration;

use groupctl::config::GlobalConfig;
use groupctl::AppError;

const MINIMAL: &str = r#"
subscription_id = "00000000-0000-0000-0000-000000000000"
resource_group = "rg-dev"
"#;

#[test]
fn minimal_config_uses_defaults() {
    let config = GlobalConfig::from_toml_str(MINIMAL).expect("config parses");

    assert_eq!(config.backend, "aci");
    assert_eq!(config.location, "westeurope");
    assert_eq!(config.management_endpoint, "https://management.azure.com");
    assert_eq!(config.api_version, "2018-10-01");
    assert!(config.access_token.is_empty());

    let policy = config.polling.policy();
    assert_eq!(policy.delay, Duration::from_secs(5));
    assert_eq!(policy.retry_attempts, 30);
    assert_eq!(policy.retry_delay, Duration::from_secs(1));
    assert_eq!(policy.timeout, Duration::from_secs(900));
}

#[test]
fn full_config_overrides_defaults() {
    let toml = r#"
backend = "aci"
subscription_id = "sub"
resource_group = "rg"
location = "northeurope"
management_endpoint = "http://127.0.0.1:8080"
api_version = "2023-05-01"

[polling]
delay_seconds = 2
retry_attempts = 5
retry_seconds = 3
timeout_seconds = 60
"#;
    let config = GlobalConfig::from_toml_str(toml).expect("config parses");

    assert_eq!(config.location, "northeurope");
    assert_eq!(config.management_endpoint, "http://127.0.0.1:8080");
    assert_eq!(config.api_version, "2023-05-01");
    assert_eq!(config.polling.delay_seconds, 2);
    assert_eq!(config.polling.retry_attempts, 5);
    assert_eq!(config.polling.policy().retry_delay, Duration::from_secs(3));
    assert_eq!(config.polling.policy().timeout, Duration::from_secs(60));
}

#[test]
fn access_token_is_never_read_from_file() {
    let toml = format!("{MINIMAL}\naccess_token = \"leaked\"\n");
    let config = GlobalConfig::from_toml_str(&toml).expect("unknown keys are ignored");
    assert!(config.access_token.is_empty());
}

#[test]
fn missing_subscription_is_rejected() {
    let err = GlobalConfig::from_toml_str("resource_group = \"rg\"").expect_err("missing field");
    assert!(matches!(err, AppError::Config(_)), "{err}");
}

#[test]
fn empty_resource_group_is_rejected() {
    let toml = r#"
subscription_id = "sub"
resource_group = "  "
"#;
    let err = GlobalConfig::from_toml_str(toml).expect_err("blank resource group");
    assert!(err.to_string().contains("resource_group"), "{err}");
}

#[test]
fn non_http_endpoint_is_rejected() {
    let toml = format!("{MINIMAL}\nmanagement_endpoint = \"ftp://example\"\n");
    let err = GlobalConfig::from_toml_str(&toml).expect_err("bad scheme");
    assert!(err.to_string().contains("management_endpoint"), "{err}");
}

#[test]
fn zero_poll_delay_is_rejected() {
    let toml = format!("{MINIMAL}\n[polling]\ndelay_seconds = 0\n");
    let err = GlobalConfig::from_toml_str(&toml).expect_err("zero delay");
    assert!(err.to_string().contains("delay_seconds"), "{err}");
}

#[test]
fn invalid_toml_is_a_config_error() {
    let err = GlobalConfig::from_toml_str("subscription_id = ").expect_err("syntax error");
    assert!(err.to_string().starts_with("config:"), "{err}");
}

#[test]
fn load_from_path_reads_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(MINIMAL.as_bytes()).expect("write config");

    let config = GlobalConfig::load_from_path(file.path()).expect("config loads");
    assert_eq!(config.resource_group, "rg-dev");
}

#[test]
fn load_from_missing_path_is_a_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = GlobalConfig::load_from_path(dir.path().join("absent.toml")).expect_err("missing");
    assert!(err.to_string().contains("failed to read config"), "{err}");
}
