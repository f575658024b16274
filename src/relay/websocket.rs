//! WebSocket transport for exec sessions.
//!
//! Payloads that are valid UTF-8 travel as text messages, anything else as
//! binary messages. Ping and pong frames are answered by tungstenite itself
//! and never surface as payloads.

use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

use crate::relay::{ChannelConnector, DuplexChannel, FrameReceiver, FrameSender};
use crate::{AppError, BoxFuture, Result};

/// Dials exec endpoints with `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a connector.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ChannelConnector for WebSocketConnector {
    fn connect<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, DuplexChannel> {
        Box::pin(async move {
            let (stream, response) = tokio_tungstenite::connect_async(uri).await?;
            debug!(status = %response.status(), "websocket connected");
            let (sink, stream) = stream.split();
            Ok(DuplexChannel {
                sender: Box::new(WsSender { sink }),
                receiver: Box::new(WsReceiver { stream }),
            })
        })
    }
}

/// Outbound half of a WebSocket.
pub struct WsSender<S> {
    sink: S,
}

impl<S> FrameSender for WsSender<S>
where
    S: Sink<Message, Error = WsError> + Unpin + Send,
{
    fn send_frame(&mut self, payload: Bytes) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let message = match std::str::from_utf8(&payload) {
                Ok(text) => Message::text(text.to_owned()),
                Err(_) => Message::binary(payload),
            };
            self.sink.send(message).await?;
            Ok(())
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            match self.sink.close().await {
                Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
                Err(err) => Err(err.into()),
            }
        })
    }
}

/// Inbound half of a WebSocket.
pub struct WsReceiver<S> {
    stream: S,
}

impl<S> WsReceiver<S> {
    /// Wrap a message stream.
    #[must_use]
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

impl<S> FrameReceiver for WsReceiver<S>
where
    S: Stream<Item = std::result::Result<Message, WsError>> + Unpin + Send,
{
    fn recv_frame(&mut self) -> BoxFuture<'_, Option<Bytes>> {
        Box::pin(async move {
            loop {
                match self.stream.next().await {
                    None | Some(Err(WsError::ConnectionClosed)) => return Ok(None),
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "websocket closed by peer");
                        return Ok(None);
                    }
                    Some(Ok(Message::Text(text))) => {
                        return Ok(Some(Bytes::copy_from_slice(text.as_bytes())));
                    }
                    Some(Ok(Message::Binary(data))) => return Ok(Some(data)),
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                    Some(Err(err)) => return Err(AppError::from(err)),
                }
            }
        })
    }
}
