//! # Uploader Binary Entry Point
//!
//! Command-line stand-in for the upload page: picks the given file(s), runs the
//! same pre-flight checks, submits to the gateway and saves the mesh.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin uploader -- cell.png
//! cargo run --bin uploader -- --config config/uploader.toml --output-dir meshes cell.png
//! ```

use clap::Parser;
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;

use mesh_relay::client::{ClientConfig, FileCandidate, UploadSession};
use mesh_relay::common::config::load_config;
use mesh_relay::common::logging::init_logger;

/// Command-line arguments for the uploader binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the uploader configuration file (TOML format)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the gateway upload URL
    #[arg(long, env = "MESH_RELAY_GATEWAY_URL")]
    gateway_url: Option<String>,

    /// Override the directory the mesh is saved to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Image to upload. Exactly one PNG is accepted.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_logger();

    let args = Args::parse();

    let mut config: ClientConfig = match &args.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    if let Some(url) = args.gateway_url {
        config.gateway.url = url;
    }
    if let Some(dir) = args.output_dir {
        config.downloads.dir = dir;
    }

    let session = UploadSession::from_config(&config)?;

    let mut candidates = Vec::with_capacity(args.files.len());
    for path in &args.files {
        candidates.push(FileCandidate::from_path(path).await?);
    }

    if let Err(e) = session.select_file(candidates) {
        error!("{}", e.user_message());
        return Ok(ExitCode::FAILURE);
    }

    match session.submit().await {
        Ok(saved) => {
            println!("{}", saved.path.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("{} ({})", e.user_message(), e);
            Ok(ExitCode::FAILURE)
        }
    }
}
