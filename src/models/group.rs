//! Container group specifications and realized group state.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// Backend naming rule for groups and containers: lowercase alphanumerics
/// and inner dashes, 1–63 characters.
const NAME_PATTERN: &str = "^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$";

fn is_valid_name(name: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NAME_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(name))
}

/// CPU and memory requested for a single container.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ResourceLimits {
    /// Number of CPU cores.
    #[serde(default = "default_cpu")]
    pub cpu: f64,
    /// Memory in gigabytes.
    #[serde(default = "default_memory_gb")]
    pub memory_gb: f64,
}

fn default_cpu() -> f64 {
    1.0
}

fn default_memory_gb() -> f64 {
    1.0
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu: default_cpu(),
            memory_gb: default_memory_gb(),
        }
    }
}

/// One container inside a [`ContainerGroupSpec`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ContainerSpec {
    /// Container name, unique within its group.
    pub name: String,
    /// Image reference, e.g. `nginx:1.27`.
    pub image: String,
    /// Resource requests.
    #[serde(default)]
    pub resources: ResourceLimits,
    /// Entrypoint override; empty keeps the image default.
    #[serde(default)]
    pub command: Vec<String>,
    /// Ports exposed by the container.
    #[serde(default)]
    pub ports: Vec<u16>,
    /// Environment variables.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl ContainerSpec {
    /// Create a container spec with default resources.
    #[must_use]
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            resources: ResourceLimits::default(),
            command: Vec::new(),
            ports: Vec::new(),
            environment: BTreeMap::new(),
        }
    }
}

/// Operating system the group runs on.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum OsType {
    /// Linux containers.
    #[default]
    Linux,
    /// Windows containers.
    Windows,
}

/// What the backend does when a container exits.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Always restart.
    #[default]
    Always,
    /// Restart only on non-zero exit.
    OnFailure,
    /// Never restart.
    Never,
}

/// Group-level address request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct IpAddressSpec {
    /// Ports opened on the group address.
    pub ports: Vec<u16>,
    /// Optional DNS label.
    #[serde(default)]
    pub dns_name_label: Option<String>,
}

/// Immutable description of a container group to create.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ContainerGroupSpec {
    /// Group name, unique within the resource group.
    pub name: String,
    /// Containers in scheduling order. The first one hosts post-create
    /// configuration.
    pub containers: Vec<ContainerSpec>,
    /// Operating system.
    #[serde(default)]
    pub os_type: OsType,
    /// Restart policy.
    #[serde(default)]
    pub restart_policy: RestartPolicy,
    /// Public address, if any.
    #[serde(default)]
    pub ip_address: Option<IpAddressSpec>,
    /// Region override; falls back to the configured location.
    #[serde(default)]
    pub location: Option<String>,
}

impl ContainerGroupSpec {
    /// Create a spec with default group-level parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, containers: Vec<ContainerSpec>) -> Self {
        Self {
            name: name.into(),
            containers,
            os_type: OsType::default(),
            restart_policy: RestartPolicy::default(),
            ip_address: None,
            location: None,
        }
    }

    /// Load and validate a group spec from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or parsed and
    /// `AppError::Validation` if the spec is invalid.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read group spec: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate a group spec from TOML.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` on TOML errors and `AppError::Validation`
    /// if the spec is invalid.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let spec: Self = toml::from_str(raw)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Check the preconditions for submitting this spec.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` when the group name is empty or
    /// malformed, there are no containers, or container names repeat.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(AppError::Validation("group name must not be empty".into()));
        }
        if !is_valid_name(&self.name) {
            return Err(AppError::Validation(format!(
                "group name {:?} must be 1-63 lowercase alphanumerics or dashes",
                self.name
            )));
        }
        if self.containers.is_empty() {
            return Err(AppError::Validation(format!(
                "group {:?} must contain at least one container",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for container in &self.containers {
            if !is_valid_name(&container.name) {
                return Err(AppError::Validation(format!(
                    "container name {:?} must be 1-63 lowercase alphanumerics or dashes",
                    container.name
                )));
            }
            if container.image.trim().is_empty() {
                return Err(AppError::Validation(format!(
                    "container {:?} has no image",
                    container.name
                )));
            }
            if !seen.insert(container.name.as_str()) {
                return Err(AppError::Validation(format!(
                    "duplicate container name {:?} in group {:?}",
                    container.name, self.name
                )));
            }
        }
        Ok(())
    }
}

/// Lifecycle state of a container group as seen by the orchestrator.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContainerGroupState {
    /// Not yet queried.
    #[default]
    Unknown,
    /// The backend has no group with this name.
    NotFound,
    /// Create request submitted; waiting for the operation.
    Creating,
    /// Operation finished; post-create configuration pending.
    Created,
    /// Group exists but cross-registration failed.
    ConfigurationFailed,
    /// Group is running and configured.
    Ready,
    /// Group was deleted.
    Deleted,
}

impl ContainerGroupState {
    /// Derive a state from a backend `provisioningState` string.
    #[must_use]
    pub fn from_provisioning_state(raw: &str) -> Self {
        match raw {
            "Succeeded" => Self::Ready,
            "Accepted" | "Pending" | "Creating" | "Updating" | "Repairing" => Self::Creating,
            "Deleting" => Self::Deleted,
            _ => Self::Unknown,
        }
    }
}

/// A container as realized by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Container {
    /// Container name.
    pub name: String,
    /// Image the container runs.
    pub image: String,
    /// Runtime state reported by the backend (`Running`, `Waiting`, ...).
    #[serde(default)]
    pub current_state: Option<String>,
}

/// A container group as realized by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ContainerGroup {
    /// Group name.
    pub name: String,
    /// Containers in backend order.
    pub containers: Vec<Container>,
    /// Raw backend provisioning state.
    #[serde(default)]
    pub provisioning_state: Option<String>,
    /// Public IP address, if assigned.
    #[serde(default)]
    pub ip_address: Option<String>,
    /// Orchestrator view of the group.
    #[serde(default)]
    pub state: ContainerGroupState,
}

impl ContainerGroup {
    /// Recompute [`ContainerGroup::state`] from the provisioning state.
    #[must_use]
    pub fn with_derived_state(mut self) -> Self {
        self.state = self
            .provisioning_state
            .as_deref()
            .map_or(ContainerGroupState::Unknown, ContainerGroupState::from_provisioning_state);
        self
    }

    /// Look up a container by name.
    #[must_use]
    pub fn container(&self, name: &str) -> Option<&Container> {
        self.containers.iter().find(|c| c.name == name)
    }
}
