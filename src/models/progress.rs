//! Progress events emitted while provisioning a container group.
//!
//! Events are fire-and-forget: a [`ProgressSink`] must never block the
//! orchestrator. Events for the same entity are delivered in emission order;
//! no ordering is promised across entities.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Status carried by a single progress event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// Entity is being worked on.
    Working,
    /// Entity reached its completion milestone.
    Done,
    /// Entity failed.
    Error,
}

/// A single progress update for a group or container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ProgressEvent {
    /// Group or container name the event refers to.
    pub id: String,
    /// Current status of the entity.
    pub status: ProgressStatus,
    /// Human-readable status text.
    pub text: String,
    /// Emission timestamp.
    pub at: DateTime<Utc>,
}

impl ProgressEvent {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(id: impl Into<String>, status: ProgressStatus, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status,
            text: text.into(),
            at: Utc::now(),
        }
    }

    /// Shorthand for a `Working` event.
    #[must_use]
    pub fn working(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, ProgressStatus::Working, text)
    }

    /// Shorthand for a `Done` event.
    #[must_use]
    pub fn done(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, ProgressStatus::Done, text)
    }

    /// Shorthand for an `Error` event.
    #[must_use]
    pub fn error(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, ProgressStatus::Error, text)
    }
}

/// Consumer of progress events.
///
/// Implementations must return promptly; the orchestrator does not wait for
/// events to be rendered.
pub trait ProgressSink: Send + Sync {
    /// Deliver one event.
    fn emit(&self, event: ProgressEvent);
}

/// Sink that logs each event through `tracing`, for structured log output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn emit(&self, event: ProgressEvent) {
        match event.status {
            ProgressStatus::Working => info!(id = %event.id, text = %event.text, "working"),
            ProgressStatus::Done => info!(id = %event.id, text = %event.text, "done"),
            ProgressStatus::Error => warn!(id = %event.id, text = %event.text, "error"),
        }
    }
}

/// Sink that keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingProgressSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgressSink {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl ProgressSink for RecordingProgressSink {
    fn emit(&self, event: ProgressEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}
