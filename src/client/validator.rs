//! # Upload Session
//!
//! The client half of the relay: holds the user's selection, pre-validates it,
//! submits it to the gateway and saves whatever comes back.
//!
//! ## State
//!
//! - pending upload: the last accepted selection
//! - in-flight flag: set for the duration of one submission
//! - error message: the last user-facing failure, cleared by a good selection
//!   or a successful submission
//!
//! Methods take `&self`, so one session can be shared (e.g. behind an `Arc`)
//! between whatever drives the UI. The in-flight flag then stops a second
//! submit from racing the first. It is local to the session and guards nothing
//! across sessions or processes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let session = UploadSession::from_config(&config)?;
//! session.select_file(vec![FileCandidate::from_path("cell.png").await?])?;
//! let saved = session.submit().await?;
//! println!("mesh written to {}", saved.path.display());
//! ```

use anyhow::{Context, Result};
use bytes::Bytes;
use log::{info, warn};
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use crate::client::config::ClientConfig;
use crate::client::save::{DownloadDir, SaveTarget};
use crate::common::upload::{
    check_extension, validate, RejectReason, UploadRequest, ValidationPolicy, ARTIFACT_FILENAME,
    FILE_FIELD,
};
use crate::gateway::error::ErrorResponse;

pub const MSG_ONLY_PNG: &str = "Only PNG files are allowed.";
pub const MSG_SINGLE_FILE: &str = "Please select a single PNG file.";
pub const MSG_NO_FILE: &str = "No file selected.";
pub const MSG_BUSY: &str = "An upload is already in progress.";
pub const MSG_PROCESSING: &str = "Error processing file.";
pub const MSG_UPLOADING: &str = "Error uploading file.";
pub const MSG_SAVING: &str = "Error saving file.";

/// A file the user picked, before validation.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub name: String,
    pub media_type: String,
    pub payload: Bytes,
}

impl FileCandidate {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            payload: payload.into(),
        }
    }

    /// Read a file from disk. The media type comes from the extension, the
    /// same way a browser file picker declares it.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let payload = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let media_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self::new(name, media_type, payload))
    }
}

impl From<FileCandidate> for UploadRequest {
    fn from(candidate: FileCandidate) -> Self {
        UploadRequest::new(candidate.payload, candidate.media_type, candidate.name)
    }
}

/// Where a successful submission left the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid selection: {0}")]
    InvalidSelection(RejectReason),

    #[error("no file selected")]
    NothingSelected,

    #[error("an upload is already in flight")]
    AlreadyInFlight,

    #[error("gateway answered {status}: {message}")]
    Gateway { status: StatusCode, message: String },

    #[error("upload failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not save artifact: {0}")]
    Save(#[from] std::io::Error),
}

impl ClientError {
    /// Warnings are reported to the user but do not touch session state.
    pub fn is_warning(&self) -> bool {
        matches!(self, ClientError::NothingSelected | ClientError::AlreadyInFlight)
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ClientError::InvalidSelection(reason) if reason.is_selection_count() => MSG_SINGLE_FILE,
            ClientError::InvalidSelection(_) => MSG_ONLY_PNG,
            ClientError::NothingSelected => MSG_NO_FILE,
            ClientError::AlreadyInFlight => MSG_BUSY,
            ClientError::Gateway { status, .. } if *status == StatusCode::BAD_REQUEST => MSG_ONLY_PNG,
            ClientError::Gateway { .. } => MSG_PROCESSING,
            ClientError::Transport(_) => MSG_UPLOADING,
            ClientError::Save(_) => MSG_SAVING,
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    pending: Option<UploadRequest>,
    /// Bumped on every accepted selection
    selection: u64,
    in_flight: bool,
    error: Option<String>,
}

/// One user's upload workflow.
pub struct UploadSession {
    http: reqwest::Client,
    gateway_url: String,
    target: Box<dyn SaveTarget>,
    policy: ValidationPolicy,
    state: Mutex<SessionState>,
}

impl UploadSession {
    pub fn new(gateway_url: impl Into<String>, target: impl SaveTarget + 'static) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build gateway HTTP client")?;

        Ok(Self {
            http,
            gateway_url: gateway_url.into(),
            target: Box::new(target),
            policy: ValidationPolicy::default(),
            state: Mutex::new(SessionState::default()),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Ok(Self::new(
            config.gateway.url.clone(),
            DownloadDir::new(config.downloads.dir.clone()),
        )?
        .with_policy(config.validation))
    }

    pub fn with_policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Filename of the pending selection, if any.
    pub fn pending_file(&self) -> Option<String> {
        self.lock().pending.as_ref().map(|u| u.filename.clone())
    }

    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight
    }

    pub fn error_message(&self) -> Option<String> {
        self.lock().error.clone()
    }

    /// Offer what the user picked.
    ///
    /// Exactly one PNG (by media type and by `.png` extension) is accepted and
    /// becomes the pending upload, clearing any earlier error. Anything else
    /// sets the error message and leaves the previous pending upload as it was.
    /// No network call is made either way.
    pub fn select_file(&self, candidates: Vec<FileCandidate>) -> Result<(), ClientError> {
        let candidates = candidates.into_iter().map(UploadRequest::from).collect();
        let mut state = self.lock();

        let accepted = validate(candidates, &self.policy)
            .and_then(|upload| check_extension(&upload.filename).map(|_| upload));

        match accepted {
            Ok(upload) => {
                info!("📎 Selected {} ({} bytes)", upload.filename, upload.size);
                state.pending = Some(upload);
                state.selection += 1;
                state.error = None;
                Ok(())
            }
            Err(reason) => {
                let err = ClientError::InvalidSelection(reason);
                warn!("⛔ Selection refused: {}", err);
                state.error = Some(err.user_message().to_string());
                Err(err)
            }
        }
    }

    /// Upload the pending file and save the returned artifact.
    ///
    /// With nothing pending, or with a submission already running, this only
    /// returns the warning. Otherwise:
    /// - success: artifact saved, pending file and error cleared
    /// - failure: error message set, pending file kept for a manual retry
    pub async fn submit(&self) -> Result<SavedArtifact, ClientError> {
        let (upload, selection) = {
            let mut state = self.lock();
            if state.in_flight {
                warn!("⚠️  {}", MSG_BUSY);
                return Err(ClientError::AlreadyInFlight);
            }
            let Some(upload) = state.pending.clone() else {
                warn!("⚠️  {}", MSG_NO_FILE);
                return Err(ClientError::NothingSelected);
            };
            state.in_flight = true;
            (upload, state.selection)
        };

        let result = {
            let _in_flight = InFlightGuard(&self.state);
            self.send(&upload).await
        };

        let mut state = self.lock();
        match &result {
            Ok(saved) => {
                info!("✅ Artifact saved to {}", saved.path.display());
                // A newer selection made while uploading stays pending.
                if state.selection == selection {
                    state.pending = None;
                }
                state.error = None;
            }
            Err(e) => {
                warn!("❌ Submission of {} failed: {}", upload.filename, e);
                state.error = Some(e.user_message().to_string());
            }
        }
        result
    }

    async fn send(&self, upload: &UploadRequest) -> Result<SavedArtifact, ClientError> {
        let part = Part::stream_with_length(upload.payload.clone(), upload.size)
            .file_name(upload.filename.clone())
            .mime_str(&upload.media_type)?;
        let form = Form::new().part(FILE_FIELD, part);

        info!(
            "📤 Uploading {} ({} bytes) to {}",
            upload.filename, upload.size, self.gateway_url
        );
        let response = self.http.post(&self.gateway_url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorResponse>().await {
                Ok(body) => body.error,
                Err(_) => status.to_string(),
            };
            return Err(ClientError::Gateway { status, message });
        }

        let filename = suggested_filename(response.headers())
            .unwrap_or_else(|| ARTIFACT_FILENAME.to_string());
        let artifact = response.bytes().await?;

        let path = self.target.save(&filename, &artifact).await?;
        Ok(SavedArtifact {
            path,
            size: artifact.len() as u64,
        })
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight flag however the submission ends, including when the
/// submitting future is dropped mid-upload.
struct InFlightGuard<'a>(&'a Mutex<SessionState>);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).in_flight = false;
    }
}

/// `filename` parameter of a `Content-Disposition` header, reduced to a bare
/// file name so a hostile value cannot point outside the download directory.
fn suggested_filename(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_DISPOSITION)?.to_str().ok()?;
    let raw = value
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("filename="))?;
    let name = Path::new(raw.trim_matches('"')).file_name()?.to_str()?;
    (!name.is_empty()).then(|| name.to_string())
}
