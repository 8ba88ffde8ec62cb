use serde::{Deserialize, Serialize};

use crate::error::RuntimeResult;

/// Configuration for a runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Ticks between a cross-world teleport and the passenger remount.
    pub passenger_remount_delay: u64,
    /// Chunk radius loaded around a teleport destination.
    pub chunk_preload_radius: u32,
    /// Whether tracking entries emit sync packets on tick.
    pub network_sync: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            passenger_remount_delay: 2,
            chunk_preload_radius: 3,
            network_sync: true,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> RuntimeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the passenger remount delay in ticks.
    pub fn with_passenger_remount_delay(mut self, ticks: u64) -> Self {
        self.passenger_remount_delay = ticks;
        self
    }

    /// Set the chunk preload radius.
    pub fn with_chunk_preload_radius(mut self, radius: u32) -> Self {
        self.chunk_preload_radius = radius;
        self
    }

    /// Enable or disable per-tick network sync.
    pub fn with_network_sync(mut self, enabled: bool) -> Self {
        self.network_sync = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;

    #[test]
    fn config_default_values() {
        let config = RuntimeConfig::default();
        assert_eq!(config.passenger_remount_delay, 2);
        assert_eq!(config.chunk_preload_radius, 3);
        assert!(config.network_sync);
    }

    #[test]
    fn config_builder_chain() {
        let config = RuntimeConfig::default()
            .with_passenger_remount_delay(5)
            .with_chunk_preload_radius(1)
            .with_network_sync(false);
        assert_eq!(config.passenger_remount_delay, 5);
        assert_eq!(config.chunk_preload_radius, 1);
        assert!(!config.network_sync);
    }

    #[test]
    fn from_json_fills_missing_keys() {
        let config = RuntimeConfig::from_json(r#"{ "chunk_preload_radius": 0 }"#).unwrap();
        assert_eq!(config.chunk_preload_radius, 0);
        assert_eq!(config.passenger_remount_delay, 2);
    }

    #[test]
    fn from_json_rejects_malformed_input() {
        let err = RuntimeConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }
}
