#![forbid(unsafe_code)]

//! Provision remote container groups and relay interactive exec sessions.

use std::future::Future;
use std::pin::Pin;

pub mod backend;
pub mod config;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod relay;

pub use config::GlobalConfig;
pub use errors::{AppError, RelayDirection, Result};

/// Boxed, sendable future resolving to a crate [`Result`].
///
/// Used at trait seams so implementations stay object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;
