#![allow(dead_code)]

use mesh_relay::gateway::{build_router, GatewayConfig};
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use wiremock::{Request, Respond, ResponseTemplate};

/// PNG signature plus the start of an IHDR chunk.
pub const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
];

/// Start a gateway on an ephemeral port and return its base URL.
pub async fn spawn_gateway(config: GatewayConfig) -> String {
    let app = build_router(&config).expect("router builds");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Gateway config relaying to `backend_url` with a short timeout.
pub fn config_for(backend_url: String) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.server.address = "127.0.0.1:0".to_string();
    config.backend.url = backend_url;
    config.backend.timeout_secs = 5;
    config.backend.connect_timeout_secs = 1;
    config
}

/// A URL on a port nothing listens on.
pub fn refused_url() -> String {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    format!("http://127.0.0.1:{}/process", port)
}

pub fn file_form(name: &str, media_type: &str, payload: &[u8]) -> Form {
    Form::new().part("file", file_part(name, media_type, payload))
}

pub fn file_part(name: &str, media_type: &str, payload: &[u8]) -> Part {
    Part::bytes(payload.to_vec())
        .file_name(name.to_string())
        .mime_str(media_type)
        .unwrap()
}

/// Backend that answers 200 with `OBJ:` followed by the exact request body it
/// received, so every artifact is traceable to its upload.
pub struct EchoArtifact {
    pub delay: Duration,
}

impl EchoArtifact {
    pub fn immediate() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }

    /// Holds each response long enough for concurrent uploads to overlap.
    pub fn slow() -> Self {
        Self {
            delay: Duration::from_millis(200),
        }
    }
}

impl Respond for EchoArtifact {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut artifact = b"OBJ:".to_vec();
        artifact.extend_from_slice(&request.body);
        ResponseTemplate::new(200)
            .set_body_raw(artifact, "application/octet-stream")
            .set_delay(self.delay)
    }
}

pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
