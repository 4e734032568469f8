use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::common::upload::ValidationPolicy;

/// Uploader configuration loaded from TOML file.
///
/// # Example TOML
///
/// ```toml
/// [gateway]
/// url = "http://127.0.0.1:3000/api/upload"
///
/// [downloads]
/// dir = "downloads"
///
/// [validation]
/// verify_signature = false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub gateway: GatewayTarget,
    #[serde(default)]
    pub downloads: DownloadSettings,
    /// Pre-flight checks; the gateway applies its own regardless
    #[serde(default)]
    pub validation: ValidationPolicy,
}

/// Where uploads are sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayTarget {
    /// Full URL of the gateway's upload endpoint
    #[serde(default = "default_gateway_url")]
    pub url: String,
}

/// Where returned artifacts are saved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSettings {
    #[serde(default = "default_download_dir")]
    pub dir: PathBuf,
}

impl Default for GatewayTarget {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
        }
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            dir: default_download_dir(),
        }
    }
}

fn default_gateway_url() -> String {
    "http://127.0.0.1:3000/api/upload".to_string()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}
