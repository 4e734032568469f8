//! # Gateway Configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file yields a
//! gateway on `127.0.0.1:3000` relaying to `http://127.0.0.1:5000/process`.
//!
//! # Example TOML
//!
//! ```toml
//! [server]
//! address = "0.0.0.0:3000"
//! max_upload_bytes = 20971520
//! static_dir = "frontend/build"
//!
//! [backend]
//! url = "http://127.0.0.1:5000/process"
//! field_name = "file"
//! timeout_secs = 300
//! connect_timeout_secs = 10
//!
//! [validation]
//! verify_signature = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::common::upload::{ValidationPolicy, FILE_FIELD};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub validation: ValidationPolicy,
}

/// Inbound side: where the gateway listens and what it accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Listen address (e.g. "127.0.0.1:3000")
    #[serde(default = "default_address")]
    pub address: String,
    /// Upper bound on a whole upload request body
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Directory of a prebuilt frontend to serve for every non-API path
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

/// Outbound side: the processing backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Full URL (address and route) uploads are POSTed to
    #[serde(default = "default_backend_url")]
    pub url: String,
    /// Multipart field name the backend reads the image from
    #[serde(default = "default_field_name")]
    pub field_name: String,
    /// Bound on a whole backend exchange, body included. 0 waits forever.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl BackendConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(self.connect_timeout_secs))
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: default_address(),
            max_upload_bytes: default_max_upload_bytes(),
            static_dir: None,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            field_name: default_field_name(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_backend_url() -> String {
    "http://127.0.0.1:5000/process".to_string()
}

fn default_field_name() -> String {
    FILE_FIELD.to_string()
}

// Mesh generation on CPU takes minutes.
fn default_timeout_secs() -> u64 {
    300
}

fn default_connect_timeout_secs() -> u64 {
    10
}
