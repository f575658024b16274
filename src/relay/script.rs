//! Pre-loaded input for automated exec sessions.

use std::io::Cursor;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

/// Reader that yields a fixed command list joined by `\n`, then reports
/// end-of-input.
///
/// Paired with [`tokio::io::sink`] it drives an exec session exactly as if
/// the commands had been typed.
#[derive(Debug, Clone)]
pub struct CommandScript {
    inner: Cursor<Vec<u8>>,
}

impl CommandScript {
    /// Build a script from `commands`.
    #[must_use]
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = commands
            .into_iter()
            .map(|c| c.as_ref().to_owned())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            inner: Cursor::new(joined.into_bytes()),
        }
    }

    /// Full script text.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.get_ref()
    }

    /// Bytes not yet read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        let consumed = usize::try_from(self.inner.position()).unwrap_or(usize::MAX);
        self.inner.get_ref().len().saturating_sub(consumed)
    }
}

impl AsyncRead for CommandScript {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}
