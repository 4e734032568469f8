//! # Gateway Endpoint
//!
//! HTTP surface of the gateway and the per-request upload lifecycle.
//!
//! ## Request Lifecycle
//!
//! ```text
//! Received -> Validating -> Rejected
//!                        -> Forwarding -> BackendSuccess -> Relaying -> Done
//!                                      -> BackendFailure -> ErrorReturned
//!                                      -> TransportError -> ErrorReturned
//! ```
//!
//! `Rejected`, `Done` and `ErrorReturned` are terminal. Any fault outside that
//! path (a broken multipart stream, a panic) also ends in `ErrorReturned` with
//! the generic 500 body.
//!
//! Each request owns its lifecycle and buffers. The only shared value is the
//! read-only [`AppState`]. If the caller disconnects, hyper drops the handler
//! future, which drops the outstanding backend call along with the upload bytes.

use anyhow::{Context, Result};
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{debug, error, info, warn};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use uuid::Uuid;

use crate::common::upload::{validate, UploadRequest, ValidationPolicy, FILE_FIELD};
use crate::gateway::backend::{BackendClient, BackendResponse};
use crate::gateway::config::GatewayConfig;
use crate::gateway::error::{ErrorResponse, GatewayError, MSG_INTERNAL};
use crate::gateway::relay::relay_artifact;

/// Route the uploader posts to.
pub const UPLOAD_ROUTE: &str = "/api/upload";
pub const HEALTH_ROUTE: &str = "/api/health";

/// Read-only state shared by every request.
pub struct AppState {
    backend: BackendClient,
    policy: ValidationPolicy,
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validating,
    Rejected,
    Forwarding,
    BackendSuccess,
    BackendFailure,
    TransportError,
    Relaying,
    Done,
    ErrorReturned,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Rejected | Stage::Done | Stage::ErrorReturned)
    }

    pub fn can_advance_to(self, next: Stage) -> bool {
        use Stage::*;
        match (self, next) {
            (Received, Validating)
            | (Validating, Rejected)
            | (Validating, Forwarding)
            | (Forwarding, BackendSuccess)
            | (Forwarding, BackendFailure)
            | (Forwarding, TransportError)
            | (BackendSuccess, Relaying)
            | (Relaying, Done) => true,
            // Unexpected faults may end any request that is still open.
            (from, ErrorReturned) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tracks one upload through [`Stage`]s, tagged with a request id for the logs.
#[derive(Debug)]
pub struct UploadLifecycle {
    id: Uuid,
    stage: Stage,
    started: Instant,
}

impl UploadLifecycle {
    pub fn start() -> Self {
        Self {
            id: Uuid::new_v4(),
            stage: Stage::Received,
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Move to `next`. Returns false (and leaves the stage alone) if the
    /// transition is not part of the lifecycle.
    pub fn advance(&mut self, next: Stage) -> bool {
        if !self.stage.can_advance_to(next) {
            warn!(
                "⚠️  [{}] Ignoring illegal transition {} -> {}",
                self.id, self.stage, next
            );
            return false;
        }
        debug!("[{}] {} -> {}", self.id, self.stage, next);
        self.stage = next;
        true
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Build the gateway's router from its configuration.
///
/// - `POST /api/upload`: the upload endpoint
/// - `GET /api/health`: liveness probe
/// - anything else: the static frontend, when `server.static_dir` is set
pub fn build_router(config: &GatewayConfig) -> Result<Router> {
    let state = Arc::new(AppState {
        backend: BackendClient::new(&config.backend)?,
        policy: config.validation,
    });

    let mut app = routes();
    if let Some(dir) = &config.server.static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    Ok(with_layers(app, config).with_state(state))
}

fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(UPLOAD_ROUTE, post(upload_handler))
        .route(HEALTH_ROUTE, get(health_check))
}

/// Body limit, panic catching and CORS, applied to every route.
fn with_layers(app: Router<Arc<AppState>>, config: &GatewayConfig) -> Router<Arc<AppState>> {
    app.layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "mesh-relay-gateway",
    }))
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    error!("💥 Upload handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(MSG_INTERNAL)),
    )
        .into_response()
}

// ============================================================================
// HANDLER
// ============================================================================

async fn upload_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut lifecycle = UploadLifecycle::start();
    info!("📥 [{}] Upload received", lifecycle.id());

    match process_upload(&state, multipart, &mut lifecycle).await {
        Ok(response) => {
            lifecycle.advance(Stage::Done);
            info!(
                "✅ [{}] Artifact relayed in {:.2?}",
                lifecycle.id(),
                lifecycle.started.elapsed()
            );
            response
        }
        Err(err) => {
            if !lifecycle.stage().is_terminal() {
                lifecycle.advance(Stage::ErrorReturned);
            }
            debug!("[{}] {}", lifecycle.id(), err);
            err.into_response()
        }
    }
}

/// Steps 1-3 of an upload. Anything returned as `Err` becomes the JSON error body.
async fn process_upload(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
    lifecycle: &mut UploadLifecycle,
) -> Result<Response, GatewayError> {
    // A body that is not multipart at all carries no file field.
    let files = match multipart {
        Ok(multipart) => collect_file_fields(multipart).await?,
        Err(rejection) => {
            debug!("[{}] Not a multipart body: {}", lifecycle.id(), rejection);
            Vec::new()
        }
    };

    // Step 1: authoritative validation
    lifecycle.advance(Stage::Validating);
    let upload = match validate(files, &state.policy) {
        Ok(upload) => upload,
        Err(reason) => {
            lifecycle.advance(Stage::Rejected);
            return Err(reason.into());
        }
    };

    // Step 2: forward unmodified
    lifecycle.advance(Stage::Forwarding);
    info!(
        "📤 [{}] Forwarding {} ({} bytes) to {}",
        lifecycle.id(),
        upload.filename,
        upload.size,
        state.backend.url()
    );

    let artifact = match state.backend.forward(&upload).await {
        Ok(BackendResponse::Success {
            artifact,
            media_type,
        }) => {
            lifecycle.advance(Stage::BackendSuccess);
            debug!(
                "[{}] Backend produced {} bytes of {}",
                lifecycle.id(),
                artifact.len(),
                media_type
            );
            artifact
        }
        Ok(BackendResponse::Failure { status, diagnostic }) => {
            lifecycle.advance(Stage::BackendFailure);
            return Err(GatewayError::Backend { status, diagnostic });
        }
        Err(e) => {
            lifecycle.advance(Stage::TransportError);
            return Err(e.into());
        }
    };

    // Step 3: relay verbatim
    lifecycle.advance(Stage::Relaying);
    Ok(relay_artifact(artifact))
}

/// Drain the multipart body, keeping every `file` field in full.
///
/// Fields with other names are skipped. A stream that breaks mid-way (client
/// abort, body over the size limit) is an unexpected failure, not a validation
/// outcome.
async fn collect_file_fields(mut multipart: Multipart) -> Result<Vec<UploadRequest>, GatewayError> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .context("failed to read multipart field")?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let media_type = field.content_type().unwrap_or_default().to_string();
        let payload = field
            .bytes()
            .await
            .with_context(|| format!("failed to read upload body of {:?}", filename))?;

        files.push(UploadRequest::new(payload, media_type, filename));
    }

    Ok(files)
}
