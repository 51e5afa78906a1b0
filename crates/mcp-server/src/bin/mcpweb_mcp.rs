//! McpWeb gateway MCP server.
//!
//! Aggregates the services listed in `server.config.json` behind the uniform
//! five-operation tool surface and serves them over stdio.
//!
//! ## Usage
//!
//! Add to your MCP client configuration:
//! ```json
//! {
//!   "mcpServers": {
//!     "mcpweb": {
//!       "command": "mcpweb-mcp"
//!     }
//!   }
//! }
//! ```

use anyhow::Result;
use mcpweb_gateway::{Gateway, GatewayConfig};
use mcpweb_mcp::GatewayService;
use rmcp::transport::stdio;
use rmcp::ServiceExt;
use std::path::PathBuf;

fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("server.config.json")];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".mcpweb").join("server.config.json"));
    }
    paths.push(PathBuf::from("/etc/mcpweb/server.config.json"));
    paths
}

fn load_config() -> Result<GatewayConfig> {
    for path in config_search_paths() {
        if path.exists() {
            log::info!("loading configuration from {}", path.display());
            return Ok(GatewayConfig::from_file(&path)?);
        }
    }
    log::warn!("no server.config.json found; starting with no backend services");
    Ok(GatewayConfig::default())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Configure logging to stderr only (stdout is for MCP protocol)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    log::info!("Starting McpWeb gateway MCP server");

    let gateway = Gateway::builder().configure(load_config()?).build()?;
    let service = GatewayService::new(gateway.clone());
    let server = service.serve(stdio()).await?;

    // Wait for shutdown
    server.waiting().await?;
    gateway.shutdown().await;

    log::info!("McpWeb gateway MCP server stopped");
    Ok(())
}
