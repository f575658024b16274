//! HTTP implementation of [`RemoteClient`] for the container-group
//! management REST API.
//!
//! Every request carries the configured bearer token and the
//! `api-version` query parameter. A create-or-update call returns an
//! [`AciOperation`] that polls the `Azure-AsyncOperation` status document
//! when the service provides one, and the group's own `provisioningState`
//! otherwise.

use std::sync::Arc;

use reqwest::header::HeaderMap;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

use crate::backend::poll::{self, Clock, PollPolicy, Probe, ProbeStatus, TokioClock};
use crate::backend::wire::{
    ArmAsyncOperation, ArmContainerGroup, ArmErrorResponse, ArmExecRequest, ArmExecResponse,
    ArmLogs,
};
use crate::backend::{ExecEndpoint, OperationHandle, RemoteClient, TerminalSize};
use crate::config::GlobalConfig;
use crate::models::group::{ContainerGroup, ContainerGroupSpec, ContainerGroupState};
use crate::{AppError, BoxFuture, Result};

/// User agent sent with every request.
pub const USER_AGENT: &str = "groupctl";

/// Header naming the status document of an asynchronous operation.
const ASYNC_OPERATION_HEADER: &str = "Azure-AsyncOperation";

/// Connection settings for [`AciClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AciSettings {
    /// Base URL of the management API, without trailing slash.
    pub endpoint: String,
    /// Subscription identifier.
    pub subscription_id: String,
    /// Resource group holding container groups.
    pub resource_group: String,
    /// Default region for new groups.
    pub location: String,
    /// `api-version` query parameter.
    pub api_version: String,
    /// Bearer token.
    pub access_token: String,
}

impl AciSettings {
    /// Derive settings from the global configuration.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            endpoint: config.management_endpoint.trim_end_matches('/').to_owned(),
            subscription_id: config.subscription_id.clone(),
            resource_group: config.resource_group.clone(),
            location: config.location.clone(),
            api_version: config.api_version.clone(),
            access_token: config.access_token.clone(),
        }
    }
}

/// REST client for container groups.
#[derive(Clone)]
pub struct AciClient {
    http: Client,
    settings: Arc<AciSettings>,
    policy: PollPolicy,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AciClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AciClient")
            .field("endpoint", &self.settings.endpoint)
            .field("resource_group", &self.settings.resource_group)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl AciClient {
    /// Build a client using the wall clock.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the access token is missing or the HTTP
    /// client cannot be built.
    pub fn new(settings: AciSettings, policy: PollPolicy) -> Result<Self> {
        Self::with_clock(settings, policy, Arc::new(TokioClock))
    }

    /// Build a client with an injected clock for operation polling.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the access token is missing or the HTTP
    /// client cannot be built.
    pub fn with_clock(
        settings: AciSettings,
        policy: PollPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if settings.access_token.is_empty() {
            return Err(AppError::Config("access token is not loaded".into()));
        }
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| AppError::Config(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            settings: Arc::new(settings),
            policy,
            clock,
        })
    }

    /// Construct from the global configuration; used by the backend registry.
    ///
    /// # Errors
    ///
    /// See [`AciClient::new`].
    pub fn from_config(config: &GlobalConfig) -> Result<Arc<dyn RemoteClient>> {
        let client = Self::new(AciSettings::from_config(config), config.polling.policy())?;
        Ok(Arc::new(client))
    }

    fn group_url(&self, group: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ContainerInstance/containerGroups/{group}",
            self.settings.endpoint, self.settings.subscription_id, self.settings.resource_group
        )
    }

    fn with_api_version(&self, url: &str) -> String {
        format!("{url}?api-version={}", self.settings.api_version)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.settings.access_token)
    }

    async fn fetch_group(&self, name: &str) -> Result<ContainerGroup> {
        let url = self.with_api_version(&self.group_url(name));
        let response = self.request(Method::GET, &url).send().await?;
        let wire: ArmContainerGroup =
            read_json(response, &format!("container group {name:?}")).await?;
        Ok(wire.into_group(name))
    }
}

impl RemoteClient for AciClient {
    fn get<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ContainerGroup> {
        Box::pin(async move {
            debug!(group = name, "fetching container group");
            self.fetch_group(name).await
        })
    }

    fn create_or_update<'a>(
        &'a self,
        spec: &'a ContainerGroupSpec,
    ) -> BoxFuture<'a, Box<dyn OperationHandle>> {
        Box::pin(
            async move {
                let body = ArmContainerGroup::from_spec(spec, &self.settings.location);
                let url = self.with_api_version(&self.group_url(&spec.name));
                let response = self.request(Method::PUT, &url).json(&body).send().await?;
                let status_url = async_operation_url(response.headers());
                let accepted: ArmContainerGroup =
                    read_json(response, &format!("container group {:?}", spec.name)).await?;

                info!(
                    provisioning_state = accepted.properties.provisioning_state.as_deref(),
                    tracked = status_url.is_some(),
                    "create request accepted"
                );

                let operation = AciOperation {
                    client: self.clone(),
                    group: spec.name.clone(),
                    status_url,
                };
                Ok(Box::new(operation) as Box<dyn OperationHandle>)
            }
            .instrument(info_span!("create_or_update", group = %spec.name)),
        )
    }

    fn delete<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ContainerGroup> {
        Box::pin(async move {
            let url = self.with_api_version(&self.group_url(name));
            let response = self.request(Method::DELETE, &url).send().await?;
            if response.status() == StatusCode::NO_CONTENT {
                return Err(AppError::NotFound(format!("container group {name:?}")));
            }
            let what = format!("container group {name:?}");
            let response = check_status(response, &what).await?;
            let body = response.text().await?;

            let group = if body.trim().is_empty() {
                ContainerGroup {
                    name: name.to_owned(),
                    containers: Vec::new(),
                    provisioning_state: None,
                    ip_address: None,
                    state: ContainerGroupState::Unknown,
                }
            } else {
                serde_json::from_str::<ArmContainerGroup>(&body)
                    .map_err(|err| AppError::Transport(format!("{what}: invalid body: {err}")))?
                    .into_group(name)
            };
            Ok(group)
        })
    }

    fn exec_handshake<'a>(
        &'a self,
        group: &'a str,
        container: &'a str,
        command: &'a str,
        size: TerminalSize,
    ) -> BoxFuture<'a, ExecEndpoint> {
        Box::pin(async move {
            let url = self.with_api_version(&format!(
                "{}/containers/{container}/exec",
                self.group_url(group)
            ));
            let body = ArmExecRequest {
                command: command.to_owned(),
                terminal_size: size,
            };
            let response = self.request(Method::POST, &url).json(&body).send().await?;
            let exec: ArmExecResponse = read_json(
                response,
                &format!("container {container:?} in group {group:?}"),
            )
            .await?;
            debug!(group, container, command, "exec handshake complete");
            Ok(ExecEndpoint {
                uri: exec.web_socket_uri,
                password: exec.password,
            })
        })
    }

    fn list_logs<'a>(&'a self, group: &'a str, container: &'a str) -> BoxFuture<'a, String> {
        Box::pin(async move {
            let url = self.with_api_version(&format!(
                "{}/containers/{container}/logs",
                self.group_url(group)
            ));
            let response = self.request(Method::GET, &url).send().await?;
            let logs: ArmLogs = read_json(
                response,
                &format!("container {container:?} in group {group:?}"),
            )
            .await?;
            Ok(logs.content.unwrap_or_default())
        })
    }
}

/// Long-running create operation returned by [`AciClient::create_or_update`].
#[derive(Debug)]
pub struct AciOperation {
    client: AciClient,
    group: String,
    status_url: Option<String>,
}

impl Probe for AciOperation {
    fn probe(&mut self) -> BoxFuture<'_, ProbeStatus> {
        Box::pin(async move {
            if let Some(url) = &self.status_url {
                let response = self.client.request(Method::GET, url).send().await?;
                let status: ArmAsyncOperation = read_json(
                    response,
                    &format!("operation status of {:?}", self.group),
                )
                .await?;
                return Ok(match status.status.as_str() {
                    "Succeeded" => ProbeStatus::Succeeded,
                    "Failed" | "Canceled" => ProbeStatus::Failed(
                        status
                            .error
                            .map_or_else(|| status.status.clone(), |e| e.message),
                    ),
                    _ => ProbeStatus::InProgress,
                });
            }

            let group = self.client.fetch_group(&self.group).await?;
            Ok(match group.provisioning_state.as_deref() {
                Some("Succeeded") => ProbeStatus::Succeeded,
                Some(state @ ("Failed" | "Canceled")) => {
                    ProbeStatus::Failed(format!("provisioning state {state}"))
                }
                _ => ProbeStatus::InProgress,
            })
        })
    }
}

impl OperationHandle for AciOperation {
    fn wait_until_done<'a>(&'a mut self, cancel: &'a CancellationToken) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let policy = self.client.policy;
            let clock = Arc::clone(&self.client.clock);
            let operation = format!("create container group {:?}", self.group);
            poll::wait_until_done(self, &policy, clock.as_ref(), cancel, &operation).await
        })
    }

    fn result(&self) -> BoxFuture<'_, ContainerGroup> {
        Box::pin(async move { self.client.fetch_group(&self.group).await })
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn async_operation_url(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ASYNC_OPERATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Map non-success statuses to errors; 404 becomes `AppError::NotFound`,
/// 401 and 403 become `AppError::Unauthorized`.
async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(AppError::NotFound(what.to_owned()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = format!("{what}: HTTP {status}: {}", ArmErrorResponse::describe(&body));
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(AppError::Unauthorized(message));
        }
        return Err(AppError::Transport(message));
    }
    Ok(response)
}

async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    let response = check_status(response, what).await?;
    response
        .json::<T>()
        .await
        .map_err(|err| AppError::Transport(format!("{what}: invalid body: {err}")))
}
