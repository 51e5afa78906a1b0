//! MCP tools for the McpWeb gateway.
//!
//! One tool per uniform operation, with the tool names the service ecosystem
//! already speaks. Every tool call builds a fresh root context whose prompt
//! handle points back at the calling session.

use crate::prompts::SessionPrompts;
use mcpweb_gateway::{Gateway, GatewayContext, GatewayError};
use mcpweb_protocol::{ServiceListing, SCHEME_PREFIX};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo,
};
use rmcp::schemars;
use rmcp::service::{Peer, RoleServer};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Gateway MCP service.
#[derive(Clone)]
pub struct GatewayService {
    gateway: Arc<Gateway>,
    tool_router: ToolRouter<Self>,
}

impl GatewayService {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            tool_router: Self::tool_router(),
        }
    }

    fn context(&self, peer: Peer<RoleServer>) -> GatewayContext {
        self.gateway.context(Arc::new(SessionPrompts::new(peer)))
    }
}

// ============================================================================
// Tool Input Schemas
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListResourcesRequest {
    /// Name of the service
    #[schemars(description = "Name of the service, as returned by list_services")]
    pub service_name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetResourceRequest {
    /// Full resource identifier
    #[schemars(description = "Full resource identifier (e.g. \"mcpweb://email/inbox\")")]
    pub resource_uri: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchResourcesRequest {
    /// Service path to search in
    #[schemars(description = "Service path: \"email/\" or \"mcpweb://email/\"")]
    pub path: String,

    /// Search query
    #[schemars(description = "Natural language search query")]
    pub query: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct InvokeActionRequest {
    /// Action to perform
    #[schemars(description = "Action to perform (e.g. \"reply_thread\")")]
    pub action: String,

    /// Resource the action targets
    #[schemars(description = "Full resource identifier (e.g. \"mcpweb://email/thread/123\")")]
    pub resource_id: String,
}

#[tool_router]
impl GatewayService {
    /// All services behind the gateway, in configuration order.
    #[tool(
        description = "List all services available through the gateway, with their protocol and connection status."
    )]
    pub async fn list_services(&self) -> Result<CallToolResult, McpError> {
        let services = self.gateway.summaries();
        let listing = ServiceListing {
            total: services.len(),
            services,
        };
        success_json(serde_json::to_value(listing).map_err(internal)?)
    }

    /// One service's instructions and resources.
    #[tool(
        description = "Get a service's usage instructions and the resources it exposes. Resource identifiers can be passed to get_resource."
    )]
    pub async fn list_resources(
        &self,
        Parameters(request): Parameters<ListResourcesRequest>,
        peer: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let view = self
            .context(peer)
            .view(&request.service_name)
            .await
            .map_err(tool_error)?;
        success_json(serde_json::to_value(view).map_err(internal)?)
    }

    /// Read a resource by its full identifier.
    #[tool(
        description = "Retrieve a resource by its full mcpweb:// identifier. The service is determined from the identifier."
    )]
    pub async fn get_resource(
        &self,
        Parameters(request): Parameters<GetResourceRequest>,
        peer: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let value = self
            .context(peer)
            .get(&request.resource_uri)
            .await
            .map_err(tool_error)?;
        success_json(value)
    }

    /// Search within one service; results are full identifiers.
    #[tool(
        description = "Search for resources within a service. Returns full mcpweb:// identifiers, ranked by the backend."
    )]
    pub async fn search_resources(
        &self,
        Parameters(request): Parameters<SearchResourcesRequest>,
        peer: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let service =
            mcpweb_protocol::ResourceUri::service_from_path(&request.path).map_err(|err| {
                tool_error(GatewayError::from(err))
            })?;
        let results = self
            .context(peer)
            .find(&service, &request.query)
            .await
            .map_err(tool_error)?;
        success_json(Value::from(results))
    }

    /// Perform an action on a resource.
    #[tool(
        description = "Perform an action on a resource (may prompt you for details). The service is determined from the resource identifier."
    )]
    pub async fn invoke_action(
        &self,
        Parameters(request): Parameters<InvokeActionRequest>,
        peer: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        // POST addresses the action as the final path segment.
        let target = format!(
            "{}/{}",
            request.resource_id.trim_end_matches('/'),
            request.action
        );
        let value = self.context(peer).post(&target).await.map_err(tool_error)?;
        success_json(value)
    }
}

#[tool_handler]
impl ServerHandler for GatewayService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(format!(
                "Gateway aggregating multiple services behind one interface. \
                 Resources use the format {SCHEME_PREFIX}service/path. \
                 Workflow: list_services to discover services, list_resources \
                 for a service's instructions and resources, search_resources \
                 to find resources, get_resource to read one, and \
                 invoke_action to act on one."
            )),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}

fn success_json(value: Value) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(&value).map_err(internal)?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn internal(err: impl std::fmt::Display) -> McpError {
    McpError::internal_error(err.to_string(), None)
}

/// Gateway errors keep their stable kind tag in the error data so MCP
/// clients can branch on it.
fn tool_error(err: GatewayError) -> McpError {
    let data = Some(serde_json::json!({
        "kind": err.kind(),
        "service": err.service(),
    }));
    match err.kind() {
        "invalid_uri" | "invalid_request" | "unknown_service" => {
            McpError::invalid_params(err.to_string(), data)
        }
        _ => McpError::internal_error(err.to_string(), data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_jsonrpc_codes() {
        let err = tool_error(GatewayError::UnknownService {
            service: "docs".to_string(),
            known: vec!["email".to_string()],
        });
        assert_eq!(err.code, rmcp::model::ErrorCode::INVALID_PARAMS);
        assert_eq!(err.data.unwrap()["kind"], "unknown_service");

        let err = tool_error(GatewayError::ServiceUnavailable {
            service: "email".to_string(),
            reason: "connection reset".to_string(),
        });
        assert_eq!(err.code, rmcp::model::ErrorCode::INTERNAL_ERROR);
        assert_eq!(err.data.unwrap()["kind"], "service_unavailable");
    }
}
