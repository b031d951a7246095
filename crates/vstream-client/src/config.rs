//! Client configuration (`config.json`).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

fn default_host() -> String {
    "127.0.0.1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server QUIC port.
    pub server_port: u16,
    /// Server host; defaults to loopback.
    #[serde(default = "default_host")]
    pub server_host: String,
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| ClientError::config(format!("cannot read {}: {e}", path.display())))?;
        let config: ClientConfig = serde_json::from_str(&raw)
            .map_err(|e| ClientError::config(format!("cannot parse {}: {e}", path.display())))?;
        if config.server_port == 0 {
            return Err(ClientError::config("server_port must be non-zero"));
        }
        Ok(config)
    }
}
