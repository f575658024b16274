//! Exec session handshake and relay loop.
//!
//! [`ExecSession::open`] performs the handshake: it asks the backend for an
//! endpoint and one-time secret, dials the channel, and sends the secret as
//! the first frame. Only after that frame is flushed does the caller get a
//! session, so no local input can reach the container unauthenticated.
//!
//! [`ExecSession::run`] then spawns two tasks that share nothing but the
//! channel halves:
//!
//! - **downstream**: channel frames → local writer, until clean close.
//! - **upstream**: local reader → channel, one byte per frame, until
//!   end-of-input. The remote terminal is in raw mode, so batching would
//!   delay control characters such as Ctrl-C.
//!
//! Each task reports on its own capacity-1 channel. A downstream report or
//! any failure ends the session at once. End-of-input closes the channel and
//! then waits up to [`DRAIN_GRACE`] for the remote side to finish sending, so
//! output produced by the last input (echoes, a final prompt) still reaches
//! the writer.

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::backend::poll::cancellable;
use crate::backend::{RemoteClient, TerminalSize};
use crate::relay::{ChannelConnector, DuplexChannel, FrameReceiver, FrameSender};
use crate::{AppError, RelayDirection, Result};

/// How long the relay keeps writing remote output after local input ends.
pub const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Target and command of an exec session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    /// Container group name.
    pub group: String,
    /// Container name within the group.
    pub container: String,
    /// Command interpreter to start, e.g. `/bin/sh`.
    pub command: String,
    /// Pseudo-terminal size.
    pub size: TerminalSize,
}

impl ExecRequest {
    /// Build a request with the default terminal size.
    #[must_use]
    pub fn new(
        group: impl Into<String>,
        container: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            container: container.into(),
            command: command.into(),
            size: TerminalSize::default(),
        }
    }

    /// Override the terminal size.
    #[must_use]
    pub fn with_size(mut self, size: TerminalSize) -> Self {
        self.size = size;
        self
    }
}

/// An authenticated duplex channel bound to one container.
#[derive(Debug)]
pub struct ExecSession {
    id: Uuid,
    group: String,
    container: String,
    channel: DuplexChannel,
}

impl ExecSession {
    /// Perform the exec handshake and authenticate the channel.
    ///
    /// # Errors
    ///
    /// - Errors from the backend handshake, unchanged.
    /// - [`AppError::Transport`] if the channel cannot be opened or the
    ///   secret cannot be sent.
    /// - [`AppError::Cancelled`] if `cancel` fires first.
    pub async fn open(
        client: &dyn RemoteClient,
        connector: &dyn ChannelConnector,
        request: &ExecRequest,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let id = Uuid::new_v4();
        let span = info_span!(
            "exec_open",
            session_id = %id,
            group = %request.group,
            container = %request.container
        );

        async move {
            let endpoint = cancellable(
                cancel,
                "exec handshake",
                client.exec_handshake(
                    &request.group,
                    &request.container,
                    &request.command,
                    request.size,
                ),
            )
            .await?;

            let mut channel =
                cancellable(cancel, "exec connect", connector.connect(&endpoint.uri)).await?;

            cancellable(
                cancel,
                "exec authentication",
                channel
                    .sender
                    .send_frame(Bytes::from(endpoint.password.into_bytes())),
            )
            .await
            .map_err(|err| match err {
                AppError::Cancelled(_) => err,
                other => AppError::Transport(format!(
                    "failed to authenticate exec session: {other}"
                )),
            })?;

            info!(command = %request.command, "exec session opened");
            Ok(Self {
                id,
                group: request.group.clone(),
                container: request.container.clone(),
                channel,
            })
        }
        .instrument(span)
        .await
    }

    /// Group this session is bound to.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Container this session is bound to.
    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Relay bytes between `reader`/`writer` and the container until either
    /// direction completes.
    ///
    /// Clean close of the channel returns `Ok(())` immediately. End-of-input
    /// on `reader` closes the channel and returns `Ok(())` once the remote
    /// side closes too, or after [`DRAIN_GRACE`]. The session is consumed
    /// either way.
    ///
    /// # Errors
    ///
    /// - [`AppError::Relay`] tagged with the failing direction.
    /// - [`AppError::Cancelled`] if `cancel` fires first.
    pub async fn run<R, W>(self, reader: R, writer: W, cancel: &CancellationToken) -> Result<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let span = info_span!(
            "exec_run",
            session_id = %self.id,
            group = %self.group,
            container = %self.container
        );
        let DuplexChannel { sender, receiver } = self.channel;

        let (down_tx, mut down_rx) = mpsc::channel::<Result<()>>(1);
        let (up_tx, mut up_rx) = mpsc::channel::<Result<()>>(1);

        let downstream = tokio::spawn(
            async move {
                let outcome = pump_downstream(receiver, writer).await;
                let _ = down_tx.send(outcome).await;
            }
            .instrument(span.clone()),
        );
        let upstream = tokio::spawn(
            async move {
                let outcome = pump_upstream(reader, sender).await;
                let _ = up_tx.send(outcome).await;
            }
            .instrument(span.clone()),
        );

        let mut input_ended = false;
        let first = tokio::select! {
            () = cancel.cancelled() => {
                Err(AppError::Cancelled("exec session cancelled".into()))
            }
            report = down_rx.recv() => finish(RelayDirection::Downstream, report),
            report = up_rx.recv() => {
                let outcome = finish(RelayDirection::Upstream, report);
                input_ended = outcome.is_ok();
                outcome
            }
        };
        let outcome = if input_ended {
            drain_downstream(&mut down_rx, cancel)
                .instrument(span.clone())
                .await
        } else {
            first
        };

        downstream.abort();
        upstream.abort();

        let _guard = span.enter();
        match &outcome {
            Ok(()) => info!("exec session finished"),
            Err(err) => warn!(%err, "exec session failed"),
        }
        outcome
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Channel frames → local writer.
async fn pump_downstream<W>(mut receiver: Box<dyn FrameReceiver>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut frames: u64 = 0;
    while let Some(payload) = receiver.recv_frame().await? {
        writer.write_all(&payload).await?;
        writer.flush().await?;
        frames += 1;
    }
    debug!(frames, "downstream: channel closed");
    Ok(())
}

/// Local reader → channel, one byte per frame. Closes the channel at
/// end-of-input.
async fn pump_upstream<R>(mut reader: R, mut sender: Box<dyn FrameSender>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut byte = [0u8; 1];
    let mut sent: u64 = 0;
    loop {
        let n = reader.read(&mut byte).await?;
        if n == 0 {
            debug!(sent, "upstream: end of input");
            return sender.close().await;
        }
        sender.send_frame(Bytes::copy_from_slice(&byte)).await?;
        sent += 1;
    }
}

/// Wait for the remote side to close after local input ended.
async fn drain_downstream(
    down_rx: &mut mpsc::Receiver<Result<()>>,
    cancel: &CancellationToken,
) -> Result<()> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(AppError::Cancelled("exec session cancelled".into())),
        report = down_rx.recv() => finish(RelayDirection::Downstream, report),
        () = tokio::time::sleep(DRAIN_GRACE) => {
            debug!(grace = ?DRAIN_GRACE, "remote still open after end of input");
            Ok(())
        }
    }
}

fn finish(direction: RelayDirection, report: Option<Result<()>>) -> Result<()> {
    match report {
        Some(Ok(())) => {
            debug!(direction = direction.as_str(), "relay direction completed");
            Ok(())
        }
        Some(Err(err)) => Err(AppError::relay(direction, err)),
        None => Err(AppError::relay(direction, "relay task ended without a result")),
    }
}
