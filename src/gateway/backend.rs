//! # Backend Client
//!
//! The outbound half of the gateway: re-packages an accepted upload as a
//! multipart body, issues exactly one request to the processing backend and
//! classifies what comes back.
//!
//! ## Classification
//!
//! ```text
//! 2xx + full body read       -> BackendResponse::Success
//! any other status           -> BackendResponse::Failure
//! connect/reset/read/timeout -> TransportError
//! ```
//!
//! The artifact is never parsed. The gateway does not understand mesh formats
//! and relays whatever bytes the backend produced.

use anyhow::{Context, Result};
use bytes::Bytes;
use axum::http::StatusCode;
use log::{debug, warn};
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use thiserror::Error;

use crate::common::upload::{UploadRequest, ARTIFACT_CONTENT_TYPE};
use crate::gateway::config::BackendConfig;

/// Longest slice of a backend error body kept for the operator log.
const MAX_DIAGNOSTIC_CHARS: usize = 512;

/// What the processing backend answered, once it answered at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendResponse {
    Success {
        artifact: Bytes,
        media_type: String,
    },
    Failure {
        status: StatusCode,
        diagnostic: String,
    },
}

/// The backend could not be talked to, or stopped talking mid-response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("backend did not answer within {0:?}")]
    Timeout(Duration),

    #[error("backend request failed: {0}")]
    Request(#[source] reqwest::Error),
}

/// Client for the processing backend.
///
/// Holds one `reqwest::Client` (and so one connection pool) for the lifetime
/// of the gateway. Nothing in here is mutated per request, so concurrent
/// uploads share it freely.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    url: String,
    field_name: String,
    timeout: Option<Duration>,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(connect_timeout);
        }
        let http = builder.build().context("failed to build backend HTTP client")?;

        Ok(Self {
            http,
            url: config.url.clone(),
            field_name: config.field_name.clone(),
            timeout: config.timeout(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one upload to the backend and wait for its complete answer.
    ///
    /// The payload bytes go out as they arrived: same filename, same declared
    /// media type, no re-encoding.
    ///
    /// # Returns
    /// - `Ok(BackendResponse)`: the backend answered (successfully or not)
    /// - `Err(TransportError)`: no complete answer was obtained
    pub async fn forward(&self, upload: &UploadRequest) -> Result<BackendResponse, TransportError> {
        let form = self.build_form(upload)?;

        debug!(
            "Forwarding {} ({} bytes) to {}",
            upload.filename, upload.size, self.url
        );

        let response = self
            .http
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();

        if !status.is_success() {
            let diagnostic = read_diagnostic(response).await;
            warn!("Backend answered {} for {}: {}", status, upload.filename, diagnostic);
            return Ok(BackendResponse::Failure { status, diagnostic });
        }

        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(ARTIFACT_CONTENT_TYPE)
            .to_string();

        // Read to the end before reporting success; a truncated artifact is a
        // transport failure, never a partial relay.
        let artifact = response.bytes().await.map_err(|e| self.classify(e))?;

        Ok(BackendResponse::Success {
            artifact,
            media_type,
        })
    }

    fn build_form(&self, upload: &UploadRequest) -> Result<Form, TransportError> {
        let part = Part::stream_with_length(upload.payload.clone(), upload.size)
            .file_name(upload.filename.clone())
            .mime_str(&upload.media_type)
            .map_err(TransportError::Request)?;

        Ok(Form::new().part(self.field_name.clone(), part))
    }

    fn classify(&self, error: reqwest::Error) -> TransportError {
        match self.timeout {
            Some(limit) if error.is_timeout() => TransportError::Timeout(limit),
            _ => TransportError::Request(error),
        }
    }
}

/// Leading part of an error body, for the operator log.
///
/// Stops reading once [`MAX_DIAGNOSTIC_CHARS`] characters are certainly
/// covered, so an oversized error page is never buffered whole. Read errors
/// just end the diagnostic early.
async fn read_diagnostic(mut response: reqwest::Response) -> String {
    // A UTF-8 character is at most 4 bytes.
    let byte_budget = MAX_DIAGNOSTIC_CHARS * 4;
    let mut prefix = Vec::new();

    while prefix.len() < byte_budget {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let wanted = (byte_budget - prefix.len()).min(chunk.len());
                prefix.extend_from_slice(&chunk[..wanted]);
            }
            Ok(None) | Err(_) => break,
        }
    }

    String::from_utf8_lossy(&prefix)
        .chars()
        .take(MAX_DIAGNOSTIC_CHARS)
        .collect()
}
