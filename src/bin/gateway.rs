//! # Gateway Binary Entry Point
//!
//! Thin wrapper that loads configuration and runs the upload gateway.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin gateway -- --config config/gateway.toml
//! cargo run --bin gateway -- --backend-url http://gpu-box:5000/process
//! ```

use clap::Parser;

use mesh_relay::common::config::load_config;
use mesh_relay::common::logging::init_logger;
use mesh_relay::gateway::{self, GatewayConfig};

/// Command-line arguments for the gateway binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the gateway configuration file (TOML format).
    /// Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<String>,

    /// Override the listen address
    #[arg(long)]
    address: Option<String>,

    /// Override the processing backend URL
    #[arg(long, env = "MESH_RELAY_BACKEND_URL")]
    backend_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();

    let mut config: GatewayConfig = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(address) = args.address {
        config.server.address = address;
    }
    if let Some(url) = args.backend_url {
        config.backend.url = url;
    }

    gateway::run(config).await
}
