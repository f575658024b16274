//! Exec relay: byte streams between a local reader/writer pair and a
//! container's pseudo-terminal over a message-framed duplex channel.
//!
//! Submodules:
//! - `session`: handshake ([`ExecSession::open`]) and the two-task relay
//!   loop ([`ExecSession::run`]).
//! - `script`: [`CommandScript`], a reader that types a fixed command list.
//! - `websocket`: [`WebSocketConnector`], the production channel dialer.
//!
//! The channel is split into a [`FrameSender`] and a [`FrameReceiver`] so
//! each relay direction owns exactly one half.

pub mod script;
pub mod session;
pub mod websocket;

use bytes::Bytes;

use crate::BoxFuture;

pub use script::CommandScript;
pub use session::{ExecRequest, ExecSession, DRAIN_GRACE};
pub use websocket::WebSocketConnector;

/// Outbound half of a duplex channel.
pub trait FrameSender: Send {
    /// Send one message. Resolves once the message is flushed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// channel is broken.
    fn send_frame(&mut self, payload: Bytes) -> BoxFuture<'_, ()>;

    /// Close the channel cleanly. The remote side may keep sending until it
    /// acknowledges the close.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// close handshake cannot be sent.
    fn close(&mut self) -> BoxFuture<'_, ()>;
}

/// Inbound half of a duplex channel.
pub trait FrameReceiver: Send {
    /// Receive the next message payload; `None` on clean end-of-stream.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// channel fails.
    fn recv_frame(&mut self) -> BoxFuture<'_, Option<Bytes>>;
}

/// Both halves of an open duplex channel.
pub struct DuplexChannel {
    /// Outbound half.
    pub sender: Box<dyn FrameSender>,
    /// Inbound half.
    pub receiver: Box<dyn FrameReceiver>,
}

impl std::fmt::Debug for DuplexChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplexChannel").finish_non_exhaustive()
    }
}

/// Opens duplex channels to exec endpoints.
pub trait ChannelConnector: Send + Sync {
    /// Connect to `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// connection cannot be established.
    fn connect<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, DuplexChannel>;
}
