//! Configuration for a sync client.
//!
//! Provides sensible defaults with the ability to customize behavior
//! through the builder methods or a JSON file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Configuration for a [`SyncClient`](crate::client::SyncClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Name used in log spans to tell clients apart.
    pub client_name: String,
    /// Debounce window before a local change is pushed, in milliseconds.
    pub debounce_ms: u64,
    /// How long to wait for a first snapshot before becoming ready anyway.
    pub initial_load_timeout_ms: u64,
    /// Capacity of the sync event broadcast channel.
    pub event_channel_capacity: usize,
    /// Capacity of the command queue from handles to the event loop.
    pub command_channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            client_name: "client".to_string(),
            debounce_ms: 300,
            initial_load_timeout_ms: 2000,
            event_channel_capacity: 256,
            command_channel_capacity: 64,
        }
    }
}

impl SyncConfig {
    /// Create a default configuration with a client name.
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Set the client name.
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// Set the debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce_ms = debounce.as_millis() as u64;
        self
    }

    /// Set the initial load timeout.
    pub fn with_initial_load_timeout(mut self, timeout: Duration) -> Self {
        self.initial_load_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn initial_load_timeout(&self) -> Duration {
        Duration::from_millis(self.initial_load_timeout_ms)
    }

    /// Check that channel capacities are usable.
    pub fn validate(&self) -> SyncResult<()> {
        if self.event_channel_capacity == 0 {
            return Err(SyncError::Config(
                "event_channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.command_channel_capacity == 0 {
            return Err(SyncError::Config(
                "command_channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.debounce(), Duration::from_millis(300));
        assert_eq!(config.initial_load_timeout(), Duration::from_millis(2000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SyncConfig::new("kitchen-tablet")
            .with_debounce(Duration::from_millis(50))
            .with_initial_load_timeout(Duration::from_secs(5));
        assert_eq!(config.client_name, "kitchen-tablet");
        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.initial_load_timeout_ms, 5000);
    }

    #[test]
    fn test_from_json_partial() {
        let config = SyncConfig::from_json(r#"{"debounce_ms": 120}"#).unwrap();
        assert_eq!(config.debounce_ms, 120);
        assert_eq!(config.initial_load_timeout_ms, 2000);
        assert_eq!(config.client_name, "client");
    }

    #[test]
    fn test_from_json_rejects_zero_capacity() {
        let err = SyncConfig::from_json(r#"{"command_channel_capacity": 0}"#).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.json");
        std::fs::write(&path, r#"{"client_name": "den", "initial_load_timeout_ms": 10}"#).unwrap();

        let config = SyncConfig::load(&path).unwrap();
        assert_eq!(config.client_name, "den");
        assert_eq!(config.initial_load_timeout(), Duration::from_millis(10));

        assert!(SyncConfig::load(dir.path().join("missing.json")).is_err());
    }
}
