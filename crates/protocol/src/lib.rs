//! Shared protocol types for the McpWeb gateway.
//!
//! Everything in this crate is pure data: composite identifier parsing, the
//! uniform operation set, and the response shapes shared between the gateway
//! core and its MCP tool surface. No I/O, no backend knowledge.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod uri;

pub use uri::{ResourceUri, UriError, PATH_SEPARATOR, SCHEME, SCHEME_PREFIX};

/// The five uniform gateway operations.
///
/// `List` needs no target, `View`/`Find` target a service, `Get`/`Post`
/// target a full resource identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    List,
    View,
    Get,
    Find,
    Post,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "LIST",
            Operation::View => "VIEW",
            Operation::Get => "GET",
            Operation::Find => "FIND",
            Operation::Post => "POST",
        }
    }

    /// Parses the wire name (`"LIST"`, `"GET"`, ...). Case-insensitive.
    pub fn parse(name: &str) -> Option<Operation> {
        match name.to_ascii_uppercase().as_str() {
            "LIST" => Some(Operation::List),
            "VIEW" => Some(Operation::View),
            "GET" => Some(Operation::Get),
            "FIND" => Some(Operation::Find),
            "POST" => Some(Operation::Post),
            _ => None,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// VIEW response: what a service is and which resources it exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ServiceView {
    /// Service name as registered with the gateway.
    pub service: String,
    /// The backend's own usage instructions (may be empty).
    pub instructions: String,
    /// Resource identifiers exposed by the service.
    pub resources: Vec<String>,
}

/// One entry in the LIST response on the tool surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ServiceSummary {
    pub name: String,
    /// Protocol the service speaks (`mcp`, `rest`, `inline`, ...).
    pub protocol: String,
    /// Connection status at the time of the call (`idle`, `connecting`,
    /// `ready`, `failed`). Purely informational; no backend call is made.
    pub status: String,
}

/// LIST response on the tool surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ServiceListing {
    pub services: Vec<ServiceSummary>,
    pub total: usize,
}
