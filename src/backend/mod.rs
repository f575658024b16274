//! Compute backend abstraction.
//!
//! The [`RemoteClient`] trait decouples the orchestrator and exec relay from
//! the wire-level client that talks to the cloud provider. Mutations that
//! the provider completes asynchronously return an [`OperationHandle`].

pub mod aci;
pub mod poll;
pub mod registry;
pub mod wire;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::models::group::{ContainerGroup, ContainerGroupSpec};
use crate::BoxFuture;

/// Pseudo-terminal dimensions requested for an exec session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TerminalSize {
    /// Number of rows.
    pub rows: u16,
    /// Number of columns.
    pub cols: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

/// Connection details returned by an exec handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecEndpoint {
    /// Duplex channel endpoint (`wss://...`).
    pub uri: String,
    /// One-time secret sent as the first frame on the channel.
    pub password: String,
}

/// Handle to a long-running remote mutation.
pub trait OperationHandle: Send {
    /// Block until the operation reaches a terminal state.
    ///
    /// Polling cadence and retry budget are owned by the implementation.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Cancelled`](crate::AppError::Cancelled) if `cancel`
    /// fires, [`AppError::Timeout`](crate::AppError::Timeout) if the polling
    /// budget runs out, or [`AppError::Transport`](crate::AppError::Transport)
    /// if the operation failed remotely.
    fn wait_until_done<'a>(&'a mut self, cancel: &'a CancellationToken) -> BoxFuture<'a, ()>;

    /// Fetch the realized group once the operation has completed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// result cannot be fetched.
    fn result(&self) -> BoxFuture<'_, ContainerGroup>;
}

/// Wire-level client for the compute backend.
pub trait RemoteClient: Send + Sync {
    /// Fetch a group by name.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`](crate::AppError::NotFound) if the group
    /// does not exist; any other error is a transport failure.
    fn get<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ContainerGroup>;

    /// Submit a create-or-update request and return its operation handle.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// request is rejected.
    fn create_or_update<'a>(
        &'a self,
        spec: &'a ContainerGroupSpec,
    ) -> BoxFuture<'a, Box<dyn OperationHandle>>;

    /// Delete a group by name, returning its last known state.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`](crate::AppError::NotFound) if the group
    /// does not exist.
    fn delete<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ContainerGroup>;

    /// Request an exec session for `command` inside a container.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`](crate::AppError::NotFound) for unknown
    /// group or container names.
    fn exec_handshake<'a>(
        &'a self,
        group: &'a str,
        container: &'a str,
        command: &'a str,
        size: TerminalSize,
    ) -> BoxFuture<'a, ExecEndpoint>;

    /// Fetch the log text of a container.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`](crate::AppError::NotFound) for unknown
    /// group or container names.
    fn list_logs<'a>(&'a self, group: &'a str, container: &'a str) -> BoxFuture<'a, String>;
}
