//! Sentinel Signal MCP server
//!
//! Stdio MCP server exposing workflow scoring, limits, usage, and
//! feedback tools backed by the Sentinel Signal API. Credentials resolve
//! automatically at call time; see `sentinel-client` for the resolution
//! order.

mod server;

use std::sync::Arc;

use clap::Parser;
use rmcp::{ServiceExt, transport::stdio};
use tracing::info;

use sentinel_client::SentinelClient;
use sentinel_common::Settings;

use crate::server::SentinelServer;

#[derive(Debug, Parser)]
#[command(name = "sentinel-mcp", version, about = "Sentinel Signal MCP server")]
struct Cli {
    /// Delete the cached trial credential and exit.
    #[arg(long)]
    reset_credentials: bool,
}

/// Initializes structured logging with tracing.
///
/// Everything goes to stderr; stdout belongs to the MCP transport. Log
/// level is controlled via the `RUST_LOG` environment variable.
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sentinel_mcp=info,sentinel_client=info"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    if cli.reset_credentials {
        let path = settings.credentials_path.clone();
        if sentinel_client::store::remove(&path)? {
            info!("Removed cached credential at {}", path.display());
        } else {
            info!("No cached credential at {}", path.display());
        }
        return Ok(());
    }

    info!(
        "Starting Sentinel Signal MCP server (api: {})",
        settings.api_base_url
    );

    let client = Arc::new(SentinelClient::new(settings)?);
    let service = SentinelServer::new(client).serve(stdio()).await?;

    service.waiting().await?;

    info!("MCP transport closed, shutting down");
    Ok(())
}
