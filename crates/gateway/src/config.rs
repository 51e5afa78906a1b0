//! Gateway configuration: the external mapping of service name to
//! {endpoint, protocol}, consumed once at startup to populate the registry.
//!
//! The on-disk format is `server.config.json`:
//!
//! ```json
//! {
//!   "services": {
//!     "email": { "protocol": "mcp", "command": "email-mcp", "args": ["--sample"] },
//!     "wiki":  { "protocol": "rest", "url": "https://wiki.example.com/api" }
//!   }
//! }
//! ```
//!
//! `services` also accepts the legacy key `mcpServers`; entries without a
//! `protocol` default to `"mcp"`. Entry order in the file is the registry
//! order, which is what LIST reports.

use crate::error::{GatewayError, Result};
use crate::registry::{Endpoint, ProtocolKind, ServiceDescriptor};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    // serde_json's preserve_order feature keeps this map in file order.
    #[serde(default, alias = "mcpServers")]
    pub services: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub protocol: ProtocolKind,
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub url: Option<String>,
}

impl GatewayConfig {
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|err| GatewayError::Config(format!("invalid configuration: {err}")))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            GatewayError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::parse(&raw)
    }

    /// Validates every entry and produces descriptors in configuration order.
    pub fn into_descriptors(self) -> Result<Vec<ServiceDescriptor>> {
        let mut descriptors = Vec::with_capacity(self.services.len());
        for (name, value) in self.services {
            let service: ServiceConfig = serde_json::from_value(value).map_err(|err| {
                GatewayError::Config(format!("service '{name}': {err}"))
            })?;
            descriptors.push(service_descriptor(name, service)?);
        }
        Ok(descriptors)
    }
}

fn service_descriptor(name: String, config: ServiceConfig) -> Result<ServiceDescriptor> {
    let endpoint = match (&config.command, &config.url) {
        (Some(_), Some(_)) => {
            return Err(GatewayError::Config(format!(
                "service '{name}': 'command' and 'url' are mutually exclusive"
            )));
        }
        (Some(command), None) => Endpoint::Stdio {
            command: command.clone(),
            args: config.args.clone(),
            env: config.env.clone(),
        },
        (None, Some(url)) => Endpoint::Http { url: url.clone() },
        (None, None) => {
            return Err(GatewayError::Config(format!(
                "service '{name}': needs either 'command' or 'url'"
            )));
        }
    };

    match config.protocol {
        ProtocolKind::Inline => Err(GatewayError::Config(format!(
            "service '{name}': inline services are mounted programmatically, not configured"
        ))),
        ProtocolKind::Rest if matches!(endpoint, Endpoint::Stdio { .. }) => {
            Err(GatewayError::Config(format!(
                "service '{name}': rest services need a 'url'"
            )))
        }
        // MCP over streamable HTTP is not wired up yet; stdio only.
        ProtocolKind::Mcp if matches!(endpoint, Endpoint::Http { .. }) => {
            Err(GatewayError::Config(format!(
                "service '{name}': mcp over http is not supported yet, use a 'command'"
            )))
        }
        protocol => Ok(ServiceDescriptor {
            name,
            protocol,
            endpoint,
        }),
    }
}
