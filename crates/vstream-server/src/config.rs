//! Server configuration.
//!
//! Read from `config.json` next to the binary:
//!
//! ```json
//! {
//!   "certificate_fingerprint": "64eb794f4385406ad074428e2a667e3e8f8c279a",
//!   "server_port": 9998,
//!   "pacing_enabled": true
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

fn default_pacing() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// SHA-1 fingerprint (40 hex chars) of the server certificate.
    pub certificate_fingerprint: String,
    /// UDP port the QUIC endpoint listens on.
    pub server_port: u16,
    /// Transport pacing; disable for loopback testing.
    #[serde(default = "default_pacing")]
    pub pacing_enabled: bool,
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            ServerError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: ServerConfig = serde_json::from_str(&raw)
            .map_err(|e| ServerError::config(format!("cannot parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.certificate_fingerprint.len() != 40
            || !self
                .certificate_fingerprint
                .chars()
                .all(|c| c.is_ascii_hexdigit())
        {
            return Err(ServerError::config(
                "certificate_fingerprint must be 40 hex characters",
            ));
        }
        if self.server_port == 0 {
            return Err(ServerError::config("server_port must be non-zero"));
        }
        Ok(())
    }
}
