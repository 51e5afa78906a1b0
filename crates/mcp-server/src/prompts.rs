//! Bridges gateway prompts onto the connected MCP session.

use async_trait::async_trait;
use mcpweb_gateway::{GatewayError, PromptHandle, PromptOutcome, PromptRequest, Result};
use rmcp::model::CreateElicitationRequestParam;
use rmcp::service::{Peer, RoleServer};
use serde_json::json;

/// Prompt handle backed by the session that sent the current tool call.
/// Every nested cross-service prompt funnels through this one peer, so
/// elicitation always surfaces in the originating chat.
pub struct SessionPrompts {
    peer: Peer<RoleServer>,
}

impl SessionPrompts {
    pub fn new(peer: Peer<RoleServer>) -> Self {
        Self { peer }
    }
}

#[async_trait]
impl PromptHandle for SessionPrompts {
    async fn elicit(&self, request: PromptRequest) -> Result<PromptOutcome> {
        // The neutral prompt shape and the SDK param share the MCP wire
        // format, so the conversion is a (de)serialization round trip.
        let param: CreateElicitationRequestParam = serde_json::from_value(json!({
            "message": request.message,
            "requestedSchema": request.schema,
        }))
        .map_err(|err| GatewayError::Prompt {
            reason: format!("unsupported prompt schema: {err}"),
        })?;

        let result = self
            .peer
            .create_elicitation(param)
            .await
            .map_err(|err| GatewayError::Prompt {
                reason: format!("session rejected the prompt: {err}"),
            })?;

        serde_json::to_value(&result)
            .ok()
            .and_then(|wire| serde_json::from_value(wire).ok())
            .ok_or_else(|| GatewayError::Prompt {
                reason: "malformed elicitation result".to_string(),
            })
    }
}
