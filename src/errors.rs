//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Direction of an exec relay stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayDirection {
    /// Local input forwarded to the container.
    Upstream,
    /// Container output forwarded to the local writer.
    Downstream,
}

impl RelayDirection {
    /// Short lowercase tag used in logs and error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upstream => "upstream",
            Self::Downstream => "downstream",
        }
    }

    fn failure_message(self) -> &'static str {
        match self {
            Self::Upstream => "failed to send input to container",
            Self::Downstream => "failed to read input from container",
        }
    }
}

impl Display for RelayDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing, validation, or credential failure.
    Config(String),
    /// Container group specification failed validation.
    Validation(String),
    /// A container group with the requested name already exists.
    AlreadyExists(String),
    /// Requested group or container does not exist on the backend.
    NotFound(String),
    /// Network, HTTP, or channel failure talking to the backend.
    Transport(String),
    /// The backend rejected the credentials (HTTP 401 or 403).
    Unauthorized(String),
    /// The group was created but post-create configuration failed.
    ///
    /// The group exists remotely; the caller decides whether to delete it.
    ConfigurationFailed {
        /// Name of the group left in a partially configured state.
        group: String,
        /// Underlying failure.
        reason: String,
    },
    /// An exec relay direction failed; always terminates the session.
    Relay {
        /// Which half of the relay failed.
        direction: RelayDirection,
        /// Underlying failure.
        reason: String,
    },
    /// A long-running operation exceeded its polling budget.
    Timeout(String),
    /// The caller cancelled the operation.
    Cancelled(String),
    /// File-system or local I/O operation failure.
    Io(String),
}

impl AppError {
    /// Build a relay error tagged with the failing direction.
    #[must_use]
    pub fn relay(direction: RelayDirection, reason: impl Display) -> Self {
        Self::Relay {
            direction,
            reason: reason.to_string(),
        }
    }

    /// Returns `true` for [`AppError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Validation(msg) => write!(f, "invalid spec: {msg}"),
            Self::AlreadyExists(msg) => write!(f, "already exists: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            Self::ConfigurationFailed { group, reason } => write!(
                f,
                "configuration failed: group {group:?} was created but could not be configured: {reason}"
            ),
            Self::Relay { direction, reason } => {
                write!(f, "relay ({direction}): {}: {reason}", direction.failure_message())
            }
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Cancelled(msg) => write!(f, "cancelled: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(format!("websocket: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
