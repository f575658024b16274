//! Unit tests for access-token loading.
//!
//! The test environment has no keychain entry for the `groupctl` service,
//! so these exercise the environment-variable fallback.
//!
//! NOTE: These tests mutate process-global env vars and must run serially.

use groupctl::config::{GlobalConfig, ACCESS_TOKEN_ENV, KEYRING_SERVICE};

fn make_config() -> GlobalConfig {
    GlobalConfig::from_toml_str(
        r#"
subscription_id = "sub"
resource_group = "rg"
"#,
    )
    .expect("config parses")
}

#[tokio::test]
#[serial_test::serial]
async fn token_falls_back_to_env_var() {
    let mut config = make_config();
    std::env::set_var(ACCESS_TOKEN_ENV, "eyJ0eXAiOi-test");

    config
        .load_credentials()
        .await
        .expect("env var provides token");
    assert_eq!(config.access_token, "eyJ0eXAiOi-test");

    std::env::remove_var(ACCESS_TOKEN_ENV);
}

#[tokio::test]
#[serial_test::serial]
async fn missing_token_names_both_sources() {
    let mut config = make_config();
    std::env::remove_var(ACCESS_TOKEN_ENV);

    let err = config
        .load_credentials()
        .await
        .expect_err("no token anywhere");
    let message = err.to_string();
    assert!(message.starts_with("config:"), "{message}");
    assert!(message.contains("keychain"), "{message}");
    assert!(message.contains(ACCESS_TOKEN_ENV), "{message}");
}

#[tokio::test]
#[serial_test::serial]
async fn empty_env_var_is_treated_as_missing() {
    let mut config = make_config();
    std::env::set_var(ACCESS_TOKEN_ENV, "");

    assert!(config.load_credentials().await.is_err());

    std::env::remove_var(ACCESS_TOKEN_ENV);
}

#[test]
fn keychain_service_name_is_stable() {
    assert_eq!(KEYRING_SERVICE, "groupctl");
    assert_eq!(ACCESS_TOKEN_ENV, "GROUPCTL_ACCESS_TOKEN");
}
