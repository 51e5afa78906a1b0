//! Demo gateway: the sample email and calendar services mounted in-process,
//! served over stdio. Handy for trying the gateway without configuring any
//! real backends, and used by the integration tests.

use anyhow::Result;
use mcpweb_gateway::Gateway;
use mcpweb_mcp::demo::{CalendarDemo, EmailDemo};
use mcpweb_mcp::GatewayService;
use rmcp::transport::stdio;
use rmcp::ServiceExt;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    log::info!("Starting McpWeb demo gateway (email + calendar)");

    let gateway = Gateway::builder()
        .mount("email", Arc::new(EmailDemo::new()))
        .mount("calendar", Arc::new(CalendarDemo::new()))
        .build()?;

    let server = GatewayService::new(gateway).serve(stdio()).await?;
    server.waiting().await?;

    Ok(())
}
