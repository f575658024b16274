//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::backend::poll::PollPolicy;
use crate::{AppError, Result};

/// Keyring service under which the access token is stored.
pub const KEYRING_SERVICE: &str = "groupctl";

/// Environment variable consulted when the keychain has no token.
pub const ACCESS_TOKEN_ENV: &str = "GROUPCTL_ACCESS_TOKEN";

/// Long-running-operation polling parameters (seconds).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PollingConfig {
    /// Delay between status polls.
    #[serde(default = "default_delay_seconds")]
    pub delay_seconds: u64,
    /// Transient poll failures tolerated before giving up.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Delay after a transient poll failure.
    #[serde(default = "default_retry_seconds")]
    pub retry_seconds: u64,
    /// Overall polling budget.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_delay_seconds() -> u64 {
    5
}

fn default_retry_attempts() -> u32 {
    30
}

fn default_retry_seconds() -> u64 {
    1
}

fn default_timeout_seconds() -> u64 {
    900
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            delay_seconds: default_delay_seconds(),
            retry_attempts: default_retry_attempts(),
            retry_seconds: default_retry_seconds(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl PollingConfig {
    /// Convert to the policy consumed by the poll loop.
    #[must_use]
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            delay: Duration::from_secs(self.delay_seconds),
            retry_attempts: self.retry_attempts,
            retry_delay: Duration::from_secs(self.retry_seconds),
            timeout: Duration::from_secs(self.timeout_seconds),
        }
    }
}

fn default_backend() -> String {
    "aci".into()
}

fn default_location() -> String {
    "westeurope".into()
}

fn default_management_endpoint() -> String {
    "https://management.azure.com".into()
}

fn default_api_version() -> String {
    "2018-10-01".into()
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Backend type key resolved through the backend registry.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Cloud subscription that owns the resource group.
    pub subscription_id: String,
    /// Resource group in which container groups are created.
    pub resource_group: String,
    /// Default region for new groups.
    #[serde(default = "default_location")]
    pub location: String,
    /// Base URL of the management REST API.
    #[serde(default = "default_management_endpoint")]
    pub management_endpoint: String,
    /// API version query parameter.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Long-running-operation polling.
    #[serde(default)]
    pub polling: PollingConfig,
    /// Bearer token (populated at runtime).
    #[serde(skip)]
    pub access_token: String,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the access token from the OS keychain with env-var fallback.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if neither source provides a token.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.access_token = load_credential("access_token", ACCESS_TOKEN_ENV).await?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.subscription_id.trim().is_empty() {
            return Err(AppError::Config("subscription_id must not be empty".into()));
        }
        if self.resource_group.trim().is_empty() {
            return Err(AppError::Config("resource_group must not be empty".into()));
        }
        if !self.management_endpoint.starts_with("http://")
            && !self.management_endpoint.starts_with("https://")
        {
            return Err(AppError::Config(format!(
                "management_endpoint must be an http(s) URL, got {:?}",
                self.management_endpoint
            )));
        }
        if self.polling.delay_seconds == 0 {
            return Err(AppError::Config(
                "polling.delay_seconds must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    match env::var(env_key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(AppError::Config(format!(
            "credential {keyring_key} not found in keychain or {env_key} env var"
        ))),
    }
}
