//! MCP surface for the McpWeb gateway.
//!
//! Exposes the five uniform gateway operations as MCP tools over stdio:
//!
//! - `list_services` - all services behind the gateway
//! - `list_resources` - one service's instructions and resources
//! - `get_resource` - read a resource by its `mcpweb://` identifier
//! - `search_resources` - search within one service
//! - `invoke_action` - perform an action on a resource
//!
//! Backend-initiated prompts are relayed to the connected session through
//! MCP elicitation, so a prompt raised three services deep still surfaces in
//! the chat that triggered it.

pub mod demo;
pub mod prompts;
pub mod tools;

pub use tools::GatewayService;
