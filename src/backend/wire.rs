//! JSON wire format of the container-group management REST API.
//!
//! The API nests every resource's fields under `properties` and uses
//! camel-case keys. These types exist only at the HTTP boundary; the rest of
//! the crate works with [`ContainerGroupSpec`] and [`ContainerGroup`].

use serde::{Deserialize, Serialize};

use crate::backend::TerminalSize;
use crate::models::group::{
    Container, ContainerGroup, ContainerGroupSpec, ContainerSpec, OsType, RestartPolicy,
};

/// Container group resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArmContainerGroup {
    /// Resource name (present in responses).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Group properties.
    pub properties: ArmGroupProperties,
}

/// `properties` of a container group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArmGroupProperties {
    /// Containers in the group.
    #[serde(default)]
    pub containers: Vec<ArmContainer>,
    /// `Linux` or `Windows`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_type: Option<String>,
    /// `Always`, `OnFailure` or `Never`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<String>,
    /// Public address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<ArmIpAddress>,
    /// Provisioning state (responses only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

/// Container entry of a group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArmContainer {
    /// Container name.
    pub name: String,
    /// Container properties.
    pub properties: ArmContainerProperties,
}

/// `properties` of a container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArmContainerProperties {
    /// Image reference.
    pub image: String,
    /// Entrypoint override.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    /// Exposed ports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ArmPort>,
    /// Environment variables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment_variables: Vec<ArmEnvironmentVariable>,
    /// Resource requests.
    pub resources: ArmResources,
    /// Runtime view (responses only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_view: Option<ArmInstanceView>,
}

/// Port entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArmPort {
    /// Port number.
    pub port: u16,
    /// `TCP` or `UDP`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

/// Environment variable entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArmEnvironmentVariable {
    /// Variable name.
    pub name: String,
    /// Variable value.
    pub value: String,
}

/// Resource block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArmResources {
    /// Requested resources.
    pub requests: ArmResourceRequests,
}

/// Requested CPU and memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArmResourceRequests {
    /// CPU cores.
    pub cpu: f64,
    /// Memory in GB.
    #[serde(rename = "memoryInGB")]
    pub memory_in_gb: f64,
}

/// Runtime view of a container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArmInstanceView {
    /// Current state.
    #[serde(default)]
    pub current_state: Option<ArmContainerState>,
}

/// State entry of an instance view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArmContainerState {
    /// State name (`Running`, `Waiting`, `Terminated`).
    #[serde(default)]
    pub state: Option<String>,
}

/// Group address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArmIpAddress {
    /// `Public` or `Private`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Open ports.
    #[serde(default)]
    pub ports: Vec<ArmPort>,
    /// Assigned address (responses only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// DNS label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_name_label: Option<String>,
}

/// Body of an exec request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArmExecRequest {
    /// Command to start.
    pub command: String,
    /// Terminal dimensions.
    pub terminal_size: TerminalSize,
}

/// Body of an exec response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArmExecResponse {
    /// Duplex channel endpoint.
    pub web_socket_uri: String,
    /// One-time authentication secret.
    pub password: String,
}

/// Body of a logs response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArmLogs {
    /// Log text.
    #[serde(default)]
    pub content: Option<String>,
}

/// Status document of an asynchronous operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArmAsyncOperation {
    /// `InProgress`, `Succeeded`, `Failed` or `Canceled`.
    pub status: String,
    /// Failure detail.
    #[serde(default)]
    pub error: Option<ArmError>,
}

/// Error detail returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArmError {
    /// Machine-readable code.
    #[serde(default)]
    pub code: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

/// Envelope of an error response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArmErrorResponse {
    /// Error detail.
    pub error: ArmError,
}

impl ArmErrorResponse {
    /// Extract a readable message from a response body, falling back to the
    /// raw body.
    #[must_use]
    pub fn describe(body: &str) -> String {
        match serde_json::from_str::<Self>(body) {
            Ok(resp) if resp.error.code.is_empty() => resp.error.message,
            Ok(resp) => format!("{}: {}", resp.error.code, resp.error.message),
            Err(_) => body.trim().to_owned(),
        }
    }
}

fn os_type_name(os: OsType) -> &'static str {
    match os {
        OsType::Linux => "Linux",
        OsType::Windows => "Windows",
    }
}

fn restart_policy_name(policy: RestartPolicy) -> &'static str {
    match policy {
        RestartPolicy::Always => "Always",
        RestartPolicy::OnFailure => "OnFailure",
        RestartPolicy::Never => "Never",
    }
}

fn container_to_wire(spec: &ContainerSpec) -> ArmContainer {
    ArmContainer {
        name: spec.name.clone(),
        properties: ArmContainerProperties {
            image: spec.image.clone(),
            command: spec.command.clone(),
            ports: spec
                .ports
                .iter()
                .map(|&port| ArmPort {
                    port,
                    protocol: None,
                })
                .collect(),
            environment_variables: spec
                .environment
                .iter()
                .map(|(name, value)| ArmEnvironmentVariable {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
            resources: ArmResources {
                requests: ArmResourceRequests {
                    cpu: spec.resources.cpu,
                    memory_in_gb: spec.resources.memory_gb,
                },
            },
            instance_view: None,
        },
    }
}

impl ArmContainerGroup {
    /// Build the request body for a create-or-update call.
    #[must_use]
    pub fn from_spec(spec: &ContainerGroupSpec, default_location: &str) -> Self {
        Self {
            name: None,
            location: Some(
                spec.location
                    .clone()
                    .unwrap_or_else(|| default_location.to_owned()),
            ),
            properties: ArmGroupProperties {
                containers: spec.containers.iter().map(container_to_wire).collect(),
                os_type: Some(os_type_name(spec.os_type).to_owned()),
                restart_policy: Some(restart_policy_name(spec.restart_policy).to_owned()),
                ip_address: spec.ip_address.as_ref().map(|ip| ArmIpAddress {
                    kind: "Public".into(),
                    ports: ip
                        .ports
                        .iter()
                        .map(|&port| ArmPort {
                            port,
                            protocol: Some("TCP".into()),
                        })
                        .collect(),
                    ip: None,
                    dns_name_label: ip.dns_name_label.clone(),
                }),
                provisioning_state: None,
            },
        }
    }

    /// Convert a response body into a realized group.
    ///
    /// `fallback_name` is used when the response omits the resource name.
    #[must_use]
    pub fn into_group(self, fallback_name: &str) -> ContainerGroup {
        ContainerGroup {
            name: self.name.unwrap_or_else(|| fallback_name.to_owned()),
            containers: self
                .properties
                .containers
                .into_iter()
                .map(|c| Container {
                    name: c.name,
                    image: c.properties.image,
                    current_state: c
                        .properties
                        .instance_view
                        .and_then(|view| view.current_state)
                        .and_then(|state| state.state),
                })
                .collect(),
            provisioning_state: self.properties.provisioning_state,
            ip_address: self.properties.ip_address.and_then(|ip| ip.ip),
            state: crate::models::group::ContainerGroupState::Unknown,
        }
        .with_derived_state()
    }
}
