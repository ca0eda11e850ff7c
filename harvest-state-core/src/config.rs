//! Configuration for harvest state backend selection
//!
//! Callers pick a backend at construction time, either programmatically or by
//! parsing a store URI, then build a boxed store with
//! [`create_store_from_config`].

use crate::state::HarvestStateStore;
use crate::store::{JsonStateStore, MemoryStateStore, NullStateStore, ReadPolicy};
use crate::{HarvestStateError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Enumeration of supported state backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    /// Volatile map, lost when the process exits
    Memory,
    /// `state.json` inside a directory
    Json,
    /// Discards all state
    Null,
}

/// Configuration structure for a harvest state store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateStoreConfig {
    /// The backend to use
    pub backend: StateBackend,
    /// Store directory (required for the JSON backend)
    pub path: Option<PathBuf>,
    /// Read freshness for the JSON backend
    #[serde(default)]
    pub read_policy: ReadPolicy,
}

impl StateStoreConfig {
    /// Configuration for a volatile in-memory store
    pub fn memory() -> Self {
        StateStoreConfig {
            backend: StateBackend::Memory,
            path: None,
            read_policy: ReadPolicy::default(),
        }
    }

    /// Configuration for a JSON store rooted at `path`
    pub fn json_at<P: Into<PathBuf>>(path: P) -> Self {
        StateStoreConfig {
            backend: StateBackend::Json,
            path: Some(path.into()),
            read_policy: ReadPolicy::default(),
        }
    }

    /// Configuration for a store that records nothing
    pub fn null() -> Self {
        StateStoreConfig {
            backend: StateBackend::Null,
            path: None,
            read_policy: ReadPolicy::default(),
        }
    }

    pub fn with_read_policy(mut self, read_policy: ReadPolicy) -> Self {
        self.read_policy = read_policy;
        self
    }

    /// Parse a store URI
    ///
    /// Supports formats:
    /// - `memory:` for a volatile store
    /// - `null:` for a discarding store
    /// - `file:///var/harvest/state` or a plain path for a JSON store
    pub fn from_uri(uri: &str) -> Result<StateStoreConfig> {
        let uri = uri.trim();
        match uri {
            "" => Err(HarvestStateError::validation("Empty state store URI")),
            "memory:" | "memory://" => Ok(Self::memory()),
            "null:" | "null://" => Ok(Self::null()),
            _ => {
                let path = uri.strip_prefix("file://").unwrap_or(uri);
                if path.is_empty() {
                    return Err(HarvestStateError::validation(
                        "Invalid file URI: missing directory",
                    ));
                }
                Ok(Self::json_at(path))
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.backend == StateBackend::Json {
            match &self.path {
                Some(path) if !path.as_os_str().is_empty() => {}
                _ => {
                    return Err(HarvestStateError::validation(
                        "JSON backend requires a state directory",
                    ))
                }
            }
        }
        Ok(())
    }
}

impl Default for StateStoreConfig {
    fn default() -> Self {
        Self::memory()
    }
}

/// Create a harvest state store from configuration
///
/// # Example
/// ```rust
/// use harvest_state::{create_store_from_config, StateStoreConfig};
/// use serde_json::json;
///
/// let mut store = create_store_from_config(&StateStoreConfig::memory())?;
/// store.set_state("web_crawl", "depth", Some(json!(2)))?;
/// assert_eq!(store.get_state("web_crawl", "depth")?, Some(json!(2)));
/// # Ok::<(), harvest_state::HarvestStateError>(())
/// ```
pub fn create_store_from_config(config: &StateStoreConfig) -> Result<Box<dyn HarvestStateStore>> {
    config.validate()?;

    let store: Box<dyn HarvestStateStore> = match config.backend {
        StateBackend::Memory => Box::new(MemoryStateStore::new()),
        StateBackend::Null => Box::new(NullStateStore::new()),
        StateBackend::Json => {
            let path = config.path.as_ref().ok_or_else(|| {
                HarvestStateError::validation("JSON backend requires a state directory")
            })?;
            Box::new(JsonStateStore::new(path).with_read_policy(config.read_policy))
        }
    };

    info!(
        "Created {:?} harvest state store{}",
        config.backend,
        config
            .path
            .as_ref()
            .map(|p| format!(" at {}", p.display()))
            .unwrap_or_default()
    );
    Ok(store)
}
