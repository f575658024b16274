//! Container group lifecycle driver.
//!
//! Create runs existence check → create → wait → cross-registration and
//! reports progress for the group and for each of its containers.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::backend::poll::cancellable;
use crate::backend::RemoteClient;
use crate::models::group::{ContainerGroup, ContainerGroupSpec, ContainerGroupState};
use crate::models::progress::{ProgressEvent, ProgressSink};
use crate::orchestrator::hosts::{cross_registration_script, HOSTS_SHELL};
use crate::relay::{ChannelConnector, CommandScript, ExecRequest, ExecSession};
use crate::{AppError, Result};

/// Drives container groups through their lifecycle on one backend.
#[derive(Clone)]
pub struct Provisioner {
    client: Arc<dyn RemoteClient>,
    connector: Arc<dyn ChannelConnector>,
    progress: Arc<dyn ProgressSink>,
}

impl std::fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioner").finish_non_exhaustive()
    }
}

impl Provisioner {
    /// Create a provisioner.
    #[must_use]
    pub fn new(
        client: Arc<dyn RemoteClient>,
        connector: Arc<dyn ChannelConnector>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            client,
            connector,
            progress,
        }
    }

    /// Create a container group and configure its containers.
    ///
    /// The group-level `Done` event means the create request was accepted,
    /// not that the containers are running.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] if `spec` is malformed; nothing is sent.
    /// - [`AppError::AlreadyExists`] if a group with the same name exists.
    /// - [`AppError::ConfigurationFailed`] if the group was created but the
    ///   sibling registration failed. The group is left in place.
    /// - [`AppError::Cancelled`], [`AppError::Timeout`] or
    ///   [`AppError::Transport`] from the backend otherwise.
    pub async fn create(
        &self,
        spec: &ContainerGroupSpec,
        cancel: &CancellationToken,
    ) -> Result<ContainerGroup> {
        let span = info_span!(
            "create_group",
            group = %spec.name,
            containers = spec.containers.len()
        );

        async move {
            spec.validate()?;

            match cancellable(cancel, "existence check", self.client.get(&spec.name)).await {
                Ok(_) => {
                    return Err(AppError::AlreadyExists(format!(
                        "container group {:?}",
                        spec.name
                    )));
                }
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }

            self.progress
                .emit(ProgressEvent::working(&spec.name, "Waiting"));

            let outcome = self.provision(spec, cancel).await;
            if let Err(err) = &outcome {
                warn!(%err, "container group create failed");
                self.progress
                    .emit(ProgressEvent::error(&spec.name, err.to_string()));
            }
            outcome
        }
        .instrument(span)
        .await
    }

    /// Fetch a group, re-deriving its state from the backend.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown groups.
    pub async fn get(&self, name: &str) -> Result<ContainerGroup> {
        self.client
            .get(name)
            .await
            .map(ContainerGroup::with_derived_state)
    }

    /// Delete a group, returning its last known shape.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown groups.
    pub async fn delete(&self, name: &str) -> Result<ContainerGroup> {
        let mut group = self.client.delete(name).await?;
        group.state = ContainerGroupState::Deleted;
        info!(group = name, "container group deleted");
        Ok(group)
    }

    /// Fetch the logs of one container.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown group or container names.
    pub async fn logs(&self, group: &str, container: &str) -> Result<String> {
        self.client.list_logs(group, container).await
    }

    /// Open an exec session and relay `reader`/`writer` through it.
    ///
    /// # Errors
    ///
    /// Errors from [`ExecSession::open`] or [`ExecSession::run`].
    pub async fn exec<R, W>(
        &self,
        request: &ExecRequest,
        reader: R,
        writer: W,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let session = ExecSession::open(
            self.client.as_ref(),
            self.connector.as_ref(),
            request,
            cancel,
        )
        .await?;
        session.run(reader, writer, cancel).await
    }

    // ── Private helpers ───────────────────────────────────────────────────

    async fn provision(
        &self,
        spec: &ContainerGroupSpec,
        cancel: &CancellationToken,
    ) -> Result<ContainerGroup> {
        let mut state = ContainerGroupState::NotFound;

        let mut handle = cancellable(
            cancel,
            "create request",
            self.client.create_or_update(spec),
        )
        .await?;
        transition(&spec.name, &mut state, ContainerGroupState::Creating);

        self.progress
            .emit(ProgressEvent::done(&spec.name, "Created"));
        for container in &spec.containers {
            self.progress
                .emit(ProgressEvent::working(&container.name, "Waiting"));
        }

        handle.wait_until_done(cancel).await?;
        let mut group = cancellable(cancel, "group fetch", handle.result()).await?;

        for container in &spec.containers {
            self.progress
                .emit(ProgressEvent::done(&container.name, "Done"));
        }
        transition(&spec.name, &mut state, ContainerGroupState::Created);

        let script = cross_registration_script(&group);
        if !script.is_empty() {
            if let Err(err) = self.register_siblings(&group, script, cancel).await {
                transition(
                    &spec.name,
                    &mut state,
                    ContainerGroupState::ConfigurationFailed,
                );
                return Err(AppError::ConfigurationFailed {
                    group: group.name,
                    reason: err.to_string(),
                });
            }
        }

        transition(&spec.name, &mut state, ContainerGroupState::Ready);
        group.state = state;
        Ok(group)
    }

    /// Write every sibling into the first container's hosts file.
    async fn register_siblings(
        &self,
        group: &ContainerGroup,
        script: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let first = group
            .containers
            .first()
            .ok_or_else(|| AppError::NotFound(format!("group {:?} has no containers", group.name)))?;
        info!(
            container = %first.name,
            siblings = group.containers.len() - 1,
            "registering sibling containers"
        );

        let request = ExecRequest::new(&group.name, &first.name, HOSTS_SHELL);
        let session = ExecSession::open(
            self.client.as_ref(),
            self.connector.as_ref(),
            &request,
            cancel,
        )
        .await?;
        session
            .run(CommandScript::new(script), tokio::io::sink(), cancel)
            .await
    }
}

fn transition(group: &str, state: &mut ContainerGroupState, next: ContainerGroupState) {
    info!(group, from = ?*state, to = ?next, "container group state transition");
    *state = next;
}
