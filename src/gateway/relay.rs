//! # Response Relay
//!
//! Turns a successful backend artifact into the download response. The body is
//! handed to axum as `Bytes`, so nothing between here and the socket treats it
//! as text.

use axum::body::Body;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use crate::common::upload::{ARTIFACT_CONTENT_TYPE, ARTIFACT_FILENAME};

/// `attachment; filename="model.obj"`
pub fn artifact_disposition() -> String {
    format!("attachment; filename=\"{}\"", ARTIFACT_FILENAME)
}

/// Build the 200 response carrying the artifact verbatim.
///
/// The backend's own content type is deliberately not propagated: clients
/// always get an opaque binary download under the fixed filename.
pub fn relay_artifact(artifact: Bytes) -> Response {
    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, ARTIFACT_CONTENT_TYPE.to_string()),
            (CONTENT_DISPOSITION, artifact_disposition()),
        ],
        Body::from(artifact),
    )
        .into_response()
}
