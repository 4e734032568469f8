//! # Upload Data Model
//!
//! The request-scoped entities shared by the uploader and the gateway, and the
//! single validation rule both of them enforce.
//!
//! The rule is applied twice on purpose:
//! - the uploader runs it before any network call so the user gets an answer immediately
//! - the gateway runs it again on whatever actually arrived, and only its verdict
//!   decides whether anything is forwarded to the processing backend

use bytes::Bytes;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// WIRE CONSTANTS
// ============================================================================

/// The only media type accepted for uploads.
pub const ALLOWED_MEDIA_TYPE: &str = "image/png";

/// File extension matching [`ALLOWED_MEDIA_TYPE`].
pub const ALLOWED_EXTENSION: &str = "png";

/// Multipart field carrying the image, both client → gateway and gateway → backend.
pub const FILE_FIELD: &str = "file";

/// Filename the artifact is offered under.
pub const ARTIFACT_FILENAME: &str = "model.obj";

/// Content type the artifact is relayed with.
pub const ARTIFACT_CONTENT_TYPE: &str = "application/octet-stream";

// ============================================================================
// ENTITIES
// ============================================================================

/// One image on its way from the user to the processing backend.
///
/// Never persisted. `payload` is reference counted, so handing the request to
/// the backend client or keeping it as the pending selection does not copy the
/// image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Raw image bytes exactly as received
    pub payload: Bytes,
    /// Media type declared by the sender (not sniffed)
    pub media_type: String,
    /// Filename declared by the sender
    pub filename: String,
    /// Payload length in bytes
    pub size: u64,
}

impl UploadRequest {
    pub fn new(
        payload: impl Into<Bytes>,
        media_type: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        let payload = payload.into();
        Self {
            size: payload.len() as u64,
            payload,
            media_type: media_type.into(),
            filename: filename.into(),
        }
    }
}

/// Why a selection or an upload was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("no file was provided")]
    NoFile,

    #[error("{0} files were provided, exactly one is allowed")]
    MultipleFiles(usize),

    #[error("declared media type {0:?} is not image/png")]
    WrongMediaType(String),

    #[error("payload is not a PNG image")]
    SignatureMismatch,

    #[error("file name {0:?} does not end in .png")]
    WrongExtension(String),
}

impl RejectReason {
    /// True when the selection itself was the problem (zero or several files),
    /// as opposed to the one file being of the wrong kind.
    pub fn is_selection_count(&self) -> bool {
        matches!(self, RejectReason::NoFile | RejectReason::MultipleFiles(_))
    }
}

/// Extension filter applied by the uploader's file picker on top of [`validate`].
/// Case-insensitive, like the picker's `accept` list.
pub fn check_extension(filename: &str) -> Result<(), RejectReason> {
    let matches = filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(ALLOWED_EXTENSION));
    if matches {
        Ok(())
    } else {
        Err(RejectReason::WrongExtension(filename.to_string()))
    }
}

/// Outcome of [`validate`]: `Ok` is *Accepted*, `Err` is *Rejected*.
pub type ValidationResult = Result<UploadRequest, RejectReason>;

/// Knobs for [`validate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    /// Also require the payload's magic bytes to identify a PNG.
    #[serde(default)]
    pub verify_signature: bool,
}

// ============================================================================
// VALIDATION RULE
// ============================================================================

/// Apply the upload rule to everything the user (or the wire) supplied.
///
/// Accepts exactly one candidate whose declared media type is exactly
/// [`ALLOWED_MEDIA_TYPE`]. The comparison is byte-for-byte: `image/PNG` or
/// `image/png; foo=bar` are rejected.
///
/// # Returns
/// - `Ok(UploadRequest)`: the single accepted candidate, untouched
/// - `Err(RejectReason)`: the first rule that failed
pub fn validate(mut candidates: Vec<UploadRequest>, policy: &ValidationPolicy) -> ValidationResult {
    let upload = match candidates.len() {
        0 => return Err(RejectReason::NoFile),
        1 => candidates.remove(0),
        n => return Err(RejectReason::MultipleFiles(n)),
    };

    if upload.media_type != ALLOWED_MEDIA_TYPE {
        return Err(RejectReason::WrongMediaType(upload.media_type));
    }

    if policy.verify_signature && !looks_like_png(&upload.payload) {
        return Err(RejectReason::SignatureMismatch);
    }

    Ok(upload)
}

fn looks_like_png(payload: &[u8]) -> bool {
    matches!(image::guess_format(payload), Ok(ImageFormat::Png))
}
