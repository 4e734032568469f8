use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::{error, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::upload::RejectReason;
use crate::gateway::backend::TransportError;

pub const MSG_ONLY_PNG: &str = "Only PNG files are allowed";
pub const MSG_PROCESSING_FAILED: &str = "Failed to process file";
pub const MSG_INTERNAL: &str = "Internal Server Error";

/// JSON body of every non-200 gateway response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Every way an upload can end other than with an artifact.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The upload failed the server-side validation rule
    #[error("upload rejected: {0}")]
    ClientValidation(#[from] RejectReason),

    /// Backend reachable but answered with a non-success status
    #[error("backend answered {status}: {diagnostic}")]
    Backend {
        status: StatusCode,
        diagnostic: String,
    },

    /// Backend unreachable, reset, or too slow
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Anything else that went wrong inside the handler
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::ClientValidation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Backend { .. }
            | GatewayError::Transport(_)
            | GatewayError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a caller-safe message. Backend diagnostics and internal error
    /// chains never appear here; they go to the log only.
    pub fn user_message(&self) -> &'static str {
        match self {
            GatewayError::ClientValidation(_) => MSG_ONLY_PNG,
            GatewayError::Backend { .. } => MSG_PROCESSING_FAILED,
            GatewayError::Transport(_) | GatewayError::Unexpected(_) => MSG_INTERNAL,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match &self {
            GatewayError::ClientValidation(reason) => warn!("⛔ Upload rejected: {}", reason),
            GatewayError::Unexpected(e) => error!("❌ Upload failed unexpectedly: {:#}", e),
            other => error!("❌ Upload failed: {}", other),
        }

        (
            self.status_code(),
            Json(ErrorResponse::new(self.user_message())),
        )
            .into_response()
    }
}
