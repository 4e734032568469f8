//! # Gateway
//!
//! Server side of the relay. Receives one PNG per request, re-validates it,
//! forwards it to the processing backend and relays the resulting mesh.
//!
//! ## Modules
//!
//! - [`endpoint`]: router, upload handler and request lifecycle
//! - [`backend`]: outbound client for the processing backend
//! - [`relay`]: builds the artifact download response
//! - [`error`]: failure taxonomy and its caller-safe JSON rendering
//! - [`config`]: TOML configuration

pub mod backend;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod relay;

pub use config::GatewayConfig;
pub use endpoint::build_router;

use anyhow::{Context, Result};
use log::info;
use tokio::net::TcpListener;

/// Bind the configured address and serve until Ctrl-C.
pub async fn run(config: GatewayConfig) -> Result<()> {
    let app = build_router(&config)?;

    let listener = TcpListener::bind(&config.server.address)
        .await
        .with_context(|| format!("failed to bind {}", config.server.address))?;
    let addr = listener.local_addr()?;

    info!("🌐 Gateway running on http://{}", addr);
    info!(
        "📡 Upload endpoint: http://{}{} -> {}",
        addr,
        endpoint::UPLOAD_ROUTE,
        config.backend.url
    );
    if let Some(dir) = &config.server.static_dir {
        info!("🗂️  Serving frontend from {}", dir.display());
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("🛑 Ctrl-C received, draining in-flight uploads");
    }
}
