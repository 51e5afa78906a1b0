//! Native MCP adapter.
//!
//! Speaks to backends through the official MCP SDK, as stdio child
//! processes. The five uniform operations map onto the MCP
//! surface as follows: `view` uses the server's `instructions` plus
//! `resources/list`, `get` uses `resources/read` (falling back to the
//! backend's `get_resource` tool), `find` and `post` call the
//! `search_resources` and `invoke_action` tools.

use crate::adapter::{split_action, BackendChannel, ProtocolAdapter};
use crate::connection::Connection;
use crate::context::{GatewayContext, PromptHandle, PromptOutcome, PromptRequest};
use crate::error::{GatewayError, Result};
use crate::registry::{Endpoint, ServiceDescriptor};
use async_trait::async_trait;
use mcpweb_protocol::{ServiceView, SCHEME_PREFIX};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, ClientCapabilities, ClientInfo,
    CreateElicitationRequestParam, CreateElicitationResult, ErrorCode, Implementation,
    ReadResourceRequestParam, ReadResourceResult, ResourceContents,
};
use rmcp::service::{RequestContext, RoleClient, RunningService, ServiceError};
use rmcp::transport::TokioChildProcess;
use rmcp::{ClientHandler, ErrorData, ServiceExt};
use serde_json::Value;
use std::sync::{Arc, RwLock};
use tokio::process::Command;

// Tool names every conforming backend exposes.
const GET_TOOL: &str = "get_resource";
const SEARCH_TOOL: &str = "search_resources";
const INVOKE_TOOL: &str = "invoke_action";

/// Slot through which backend-initiated elicitation reaches the prompt
/// handle of the in-flight request.
///
/// Invariant: every request dispatched through one gateway process carries
/// the same originating session handle, so concurrent `get`/`post` calls on
/// a shared channel installing "different" handles install the same one.
#[derive(Clone, Default)]
pub(crate) struct PromptSlot(Arc<RwLock<Option<Arc<dyn PromptHandle>>>>);

impl PromptSlot {
    fn current(&self) -> Option<Arc<dyn PromptHandle>> {
        self.0.read().expect("prompt slot poisoned").clone()
    }

    pub(crate) fn install(&self, handle: Arc<dyn PromptHandle>) -> PromptGuard {
        let previous = self
            .0
            .write()
            .expect("prompt slot poisoned")
            .replace(handle);
        PromptGuard {
            slot: self.clone(),
            previous,
        }
    }
}

pub(crate) struct PromptGuard {
    slot: PromptSlot,
    previous: Option<Arc<dyn PromptHandle>>,
}

impl Drop for PromptGuard {
    fn drop(&mut self) {
        *self.slot.0.write().expect("prompt slot poisoned") = self.previous.take();
    }
}

/// rmcp client handler for one backend connection. Its only job besides the
/// handshake is forwarding the backend's elicitation requests to the
/// originating session.
#[derive(Clone)]
pub(crate) struct GatewayClientHandler {
    service: String,
    prompts: PromptSlot,
}

impl ClientHandler for GatewayClientHandler {
    #[allow(clippy::manual_async_fn)]
    fn create_elicitation(
        &self,
        request: CreateElicitationRequestParam,
        _context: RequestContext<RoleClient>,
    ) -> impl std::future::Future<
        Output = std::result::Result<CreateElicitationResult, ErrorData>,
    > + Send
           + '_ {
        async move {
            let Some(handle) = self.prompts.current() else {
                return Err(ErrorData::internal_error(
                    format!(
                        "service '{}' requested input outside an interactive request",
                        self.service
                    ),
                    None,
                ));
            };
            let outcome = handle
                .elicit(prompt_request(request))
                .await
                .map_err(|err| ErrorData::internal_error(err.to_string(), None))?;
            elicitation_result(outcome)
        }
    }

    fn get_info(&self) -> ClientInfo {
        ClientInfo {
            capabilities: ClientCapabilities::builder().enable_elicitation().build(),
            client_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}

/// Live channel to one MCP backend: the running client plus the capability
/// snapshot taken at connect time.
pub struct McpChannel {
    client: RunningService<RoleClient, GatewayClientHandler>,
    tools: Vec<String>,
    instructions: Option<String>,
    prompts: PromptSlot,
}

impl McpChannel {
    pub(crate) fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t == name)
    }
}

#[derive(Default)]
pub struct McpAdapter;

impl McpAdapter {
    async fn get_via_tool(&self, chan: &McpChannel, service: &str, uri: &str) -> Result<Value> {
        if !chan.has_tool(GET_TOOL) {
            return Err(GatewayError::protocol(
                service,
                format!(
                    "resource '{uri}' is not readable: backend exposes neither \
                     resources/read nor a '{GET_TOOL}' tool"
                ),
            ));
        }
        let result = chan
            .client
            .call_tool(CallToolRequestParam {
                name: GET_TOOL.into(),
                arguments: serde_json::json!({ "resource_uri": uri }).as_object().cloned(),
            })
            .await
            .map_err(|err| map_request_error(service, err))?;
        tool_value(service, result)
    }
}

#[async_trait]
impl ProtocolAdapter for McpAdapter {
    async fn connect(&self, descriptor: &ServiceDescriptor) -> Result<BackendChannel> {
        let service = descriptor.name.as_str();
        let prompts = PromptSlot::default();
        let handler = GatewayClientHandler {
            service: service.to_string(),
            prompts: prompts.clone(),
        };

        let client = match &descriptor.endpoint {
            Endpoint::Stdio { command, args, env } => {
                let mut cmd = Command::new(command);
                cmd.args(args);
                for (key, value) in env {
                    cmd.env(key, value);
                }
                let transport = TokioChildProcess::new(cmd).map_err(|err| {
                    GatewayError::unavailable(service, format!("spawn failed: {err}"))
                })?;
                handler.serve(transport).await.map_err(|err| {
                    GatewayError::unavailable(service, format!("initialize failed: {err}"))
                })?
            }
            Endpoint::Http { .. } => {
                // Configuration validation keeps this arm unreachable.
                return Err(GatewayError::protocol(
                    service,
                    "mcp over http is not supported yet",
                ));
            }
            Endpoint::Inline => {
                return Err(GatewayError::protocol(
                    service,
                    "inline endpoint reached the MCP adapter",
                ));
            }
        };

        // Snapshot the tool surface once; capability checks (search, invoke)
        // are answered from this list instead of a round trip per call.
        let tools = match client.list_tools(Default::default()).await {
            Ok(result) => result
                .tools
                .into_iter()
                .map(|tool| tool.name.to_string())
                .collect(),
            // Backend without a tool surface.
            Err(ServiceError::McpError(_)) => Vec::new(),
            Err(err) => return Err(GatewayError::unavailable(service, err)),
        };
        let instructions = client
            .peer_info()
            .and_then(|info| info.instructions.clone());

        Ok(BackendChannel::Mcp(McpChannel {
            client,
            tools,
            instructions,
            prompts,
        }))
    }

    async fn list(&self, conn: &Connection) -> Result<Vec<String>> {
        Ok(conn.mcp()?.tools.clone())
    }

    async fn view(&self, conn: &Connection) -> Result<ServiceView> {
        let chan = conn.mcp()?;
        let resources = match chan.client.list_resources(Default::default()).await {
            Ok(result) => result
                .resources
                .into_iter()
                .map(|resource| resource.raw.uri)
                .collect(),
            // resources/list is an optional capability.
            Err(ServiceError::McpError(_)) => Vec::new(),
            Err(err) => return Err(GatewayError::unavailable(&conn.service, err)),
        };
        Ok(ServiceView {
            service: conn.service.clone(),
            instructions: chan.instructions.clone().unwrap_or_default(),
            resources,
        })
    }

    async fn get(&self, conn: &Connection, path: &str, ctx: &GatewayContext) -> Result<Value> {
        let chan = conn.mcp()?;
        let _prompts = chan.prompts.install(ctx.prompts());
        let uri = format!("{SCHEME_PREFIX}{}{path}", conn.service);

        match chan
            .client
            .read_resource(ReadResourceRequestParam { uri: uri.clone() })
            .await
        {
            Ok(result) => resource_value(&conn.service, result),
            // Backends that only implement the tool surface.
            Err(ServiceError::McpError(err)) if err.code == ErrorCode::METHOD_NOT_FOUND => {
                self.get_via_tool(chan, &conn.service, &uri).await
            }
            Err(err) => Err(map_request_error(&conn.service, err)),
        }
    }

    async fn find(&self, conn: &Connection, query: &str) -> Result<Vec<String>> {
        let chan = conn.mcp()?;
        if !chan.has_tool(SEARCH_TOOL) {
            return Err(GatewayError::SearchNotSupported {
                service: conn.service.clone(),
            });
        }
        let result = chan
            .client
            .call_tool(CallToolRequestParam {
                name: SEARCH_TOOL.into(),
                arguments: serde_json::json!({ "query": query }).as_object().cloned(),
            })
            .await
            .map_err(|err| map_request_error(&conn.service, err))?;
        path_list(&conn.service, tool_value(&conn.service, result)?)
    }

    async fn post(&self, conn: &Connection, path: &str, ctx: &GatewayContext) -> Result<Value> {
        let chan = conn.mcp()?;
        let Some((resource, action)) = split_action(path) else {
            return Err(GatewayError::InvalidUri {
                details: format!(
                    "POST needs an action segment: 'mcpweb://{}{path}'",
                    conn.service
                ),
            });
        };
        if !chan.has_tool(INVOKE_TOOL) {
            return Err(GatewayError::protocol(
                &conn.service,
                format!("backend does not implement '{INVOKE_TOOL}'"),
            ));
        }

        let _prompts = chan.prompts.install(ctx.prompts());
        let resource_id = if resource == "/" {
            format!("{SCHEME_PREFIX}{}", conn.service)
        } else {
            format!("{SCHEME_PREFIX}{}{resource}", conn.service)
        };
        let result = chan
            .client
            .call_tool(CallToolRequestParam {
                name: INVOKE_TOOL.into(),
                arguments: serde_json::json!({
                    "action": action,
                    "resource_id": resource_id,
                })
                .as_object()
                .cloned(),
            })
            .await
            .map_err(|err| map_request_error(&conn.service, err))?;
        tool_value(&conn.service, result)
    }
}

/// SDK elicitation params -> the gateway's neutral prompt shape. Both sides
/// share the MCP wire format, so the schema converts by serialization.
fn prompt_request(param: CreateElicitationRequestParam) -> PromptRequest {
    PromptRequest {
        message: param.message.clone(),
        schema: serde_json::to_value(&param.requested_schema).unwrap_or(Value::Null),
    }
}

fn elicitation_result(
    outcome: PromptOutcome,
) -> std::result::Result<CreateElicitationResult, ErrorData> {
    let wire = serde_json::to_value(&outcome)
        .map_err(|err| ErrorData::internal_error(err.to_string(), None))?;
    serde_json::from_value(wire).map_err(|err| ErrorData::internal_error(err.to_string(), None))
}

/// Backend answered with an MCP error -> contract-level; everything else
/// (closed transport, timeout, cancelled) -> transport-level.
fn map_request_error(service: &str, err: ServiceError) -> GatewayError {
    match err {
        ServiceError::McpError(data) => GatewayError::protocol(
            service,
            format!("{} (code {})", data.message, data.code.0),
        ),
        other => GatewayError::unavailable(service, other),
    }
}

fn tool_value(service: &str, result: CallToolResult) -> Result<Value> {
    let first_text = result
        .content
        .first()
        .and_then(|content| content.as_text())
        .map(|text| text.text.clone());

    if result.is_error == Some(true) {
        let details =
            first_text.unwrap_or_else(|| "backend reported an unspecified error".to_string());
        return Err(GatewayError::protocol(service, details));
    }
    if let Some(structured) = result.structured_content {
        return Ok(structured);
    }
    match first_text {
        Some(text) => Ok(serde_json::from_str(&text).unwrap_or(Value::String(text))),
        None => Ok(Value::Null),
    }
}

fn resource_value(service: &str, result: ReadResourceResult) -> Result<Value> {
    match result.contents.into_iter().next() {
        Some(ResourceContents::TextResourceContents { text, .. }) => {
            Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
        }
        Some(_) => Err(GatewayError::protocol(
            service,
            "binary resource contents are not supported",
        )),
        None => Err(GatewayError::protocol(
            service,
            "resource read returned no contents",
        )),
    }
}

fn path_list(service: &str, value: Value) -> Result<Vec<String>> {
    let Value::Array(items) = value else {
        return Err(GatewayError::protocol(
            service,
            "search returned a non-list result",
        ));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(path) => Ok(path),
            other => Err(GatewayError::protocol(
                service,
                format!("search returned a non-string entry: {other}"),
            )),
        })
        .collect()
}
