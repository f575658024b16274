//! Explicit registry of backend constructors.
//!
//! Built once at process start and passed by reference to whatever composes
//! the orchestrator. There is no global registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::backend::aci::AciClient;
use crate::backend::RemoteClient;
use crate::config::GlobalConfig;
use crate::{AppError, Result};

/// Builds a client for one backend type from the global configuration.
pub type BackendConstructor = fn(&GlobalConfig) -> Result<Arc<dyn RemoteClient>>;

#[derive(Clone)]
struct RegisteredBackend {
    name: String,
    constructor: BackendConstructor,
}

impl std::fmt::Debug for RegisteredBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredBackend")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Mapping from backend type key to constructor.
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, RegisteredBackend>,
}

impl BackendRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in backends (`aci`).
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.backends.insert(
            "aci".into(),
            RegisteredBackend {
                name: "Azure Container Instances".into(),
                constructor: AciClient::from_config,
            },
        );
        registry
    }

    /// Register a backend under `backend_type`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `name` or `backend_type` is empty, or
    /// if `backend_type` is already registered.
    pub fn register(
        &mut self,
        name: &str,
        backend_type: &str,
        constructor: BackendConstructor,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(AppError::Config("backend: no name".into()));
        }
        if backend_type.is_empty() {
            return Err(AppError::Config("backend: no type".into()));
        }
        if self.backends.contains_key(backend_type) {
            return Err(AppError::Config("backend: already registered".into()));
        }

        self.backends.insert(
            backend_type.to_owned(),
            RegisteredBackend {
                name: name.to_owned(),
                constructor,
            },
        );
        debug!(name, backend_type, "backend registered");
        Ok(())
    }

    /// Build the client registered for `backend_type`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if no backend is registered for the type,
    /// or whatever the constructor returns.
    pub fn get(&self, backend_type: &str, config: &GlobalConfig) -> Result<Arc<dyn RemoteClient>> {
        let entry = self.backends.get(backend_type).ok_or_else(|| {
            AppError::Config(format!("backend not found for context {backend_type:?}"))
        })?;
        debug!(backend_type, name = entry.name, "constructing backend");
        (entry.constructor)(config)
    }

    /// Registered `(type, display name)` pairs, sorted by type.
    #[must_use]
    pub fn entries(&self) -> Vec<(&str, &str)> {
        self.backends
            .iter()
            .map(|(key, entry)| (key.as_str(), entry.name.as_str()))
            .collect()
    }
}
