// src/config.rs
use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Address of the WebSocket server for frontends.
    pub listen: SocketAddr,
    /// Events buffered per WebSocket client before it starts lagging.
    pub event_buffer: usize,
    // Defaults for RUN_AUTH / RUN_CHANGE_PIN requests that leave them out
    pub developer_mode: bool,
    pub status_updates: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 3500)),
            event_buffer: 100,
            developer_mode: false,
            status_updates: true,
        }
    }
}

impl BridgeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
