//! World Loader Contract
//!
//! Environment loading is provided by the host runtime. The session only
//! asks for environments by name and assumes the call completes before the
//! next phase.

use std::collections::BTreeSet;
use thiserror::Error;
use tracing::info;

/// Environment load/unload failure reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    /// Environment is unknown to the loader.
    #[error("environment not found: {0}")]
    NotFound(String),

    /// Runtime failed while loading.
    #[error("failed to load environment {name}: {reason}")]
    LoadFailed {
        /// Environment name.
        name: String,
        /// Loader-provided reason.
        reason: String,
    },
}

/// Loads and unloads round/lobby environments.
pub trait WorldLoader: Send {
    /// Load an environment, replacing whatever was active.
    fn load_environment(&mut self, name: &str) -> Result<(), WorldError>;

    /// Unload an environment.
    fn unload_environment(&mut self, name: &str) -> Result<(), WorldError>;
}

impl<W: WorldLoader + ?Sized> WorldLoader for Box<W> {
    fn load_environment(&mut self, name: &str) -> Result<(), WorldError> {
        (**self).load_environment(name)
    }

    fn unload_environment(&mut self, name: &str) -> Result<(), WorldError> {
        (**self).unload_environment(name)
    }
}

/// Loader for headless hosts: keeps track of what is loaded and logs.
///
/// Names listed in `missing` fail to load, which lets hosts and tests
/// exercise the fatal-environment path.
#[derive(Debug, Clone, Default)]
pub struct HeadlessWorld {
    loaded: BTreeSet<String>,
    history: Vec<WorldCall>,
    missing: BTreeSet<String>,
}

/// Call recorded by `HeadlessWorld`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldCall {
    /// `load_environment(name)`
    Load(String),
    /// `unload_environment(name)`
    Unload(String),
}

impl HeadlessWorld {
    /// Create a loader that accepts every environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `name` fail to load.
    pub fn with_missing(mut self, name: &str) -> Self {
        self.missing.insert(name.to_string());
        self
    }

    /// Is `name` currently loaded?
    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains(name)
    }

    /// Every call received, in order.
    pub fn history(&self) -> &[WorldCall] {
        &self.history
    }
}

impl WorldLoader for HeadlessWorld {
    fn load_environment(&mut self, name: &str) -> Result<(), WorldError> {
        self.history.push(WorldCall::Load(name.to_string()));
        if self.missing.contains(name) {
            return Err(WorldError::NotFound(name.to_string()));
        }
        // Single-environment loads replace the active one.
        self.loaded.clear();
        self.loaded.insert(name.to_string());
        info!(environment = name, "Environment loaded");
        Ok(())
    }

    fn unload_environment(&mut self, name: &str) -> Result<(), WorldError> {
        self.history.push(WorldCall::Unload(name.to_string()));
        self.loaded.remove(name);
        info!(environment = name, "Environment unloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_load_replaces_active() {
        let mut world = HeadlessWorld::new();
        world.load_environment("HubLobby").unwrap();
        world.load_environment("BeachRound").unwrap();

        assert!(world.is_loaded("BeachRound"));
        assert!(!world.is_loaded("HubLobby"));

        world.unload_environment("BeachRound").unwrap();
        assert!(!world.is_loaded("BeachRound"));
        assert_eq!(world.history().len(), 3);
    }

    #[test]
    fn test_headless_missing_environment() {
        let mut world = HeadlessWorld::new().with_missing("Volcano");
        assert_eq!(
            world.load_environment("Volcano"),
            Err(WorldError::NotFound("Volcano".to_string()))
        );
        assert!(!world.is_loaded("Volcano"));
    }
}
