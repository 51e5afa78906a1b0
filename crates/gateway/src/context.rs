//! Request context propagation.
//!
//! A [`CallContext`] travels with every request: it carries the interaction
//! handle used to surface prompts on the originating session, and the
//! visited-service set that guards nested cross-service calls against
//! cycles and unbounded depth. A [`GatewayContext`] pairs a context with the
//! dispatcher so that code running on behalf of a request, including an
//! in-process backend handler, can issue further gateway operations through
//! the very same dispatch path.

use crate::dispatcher::Gateway;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use mcpweb_protocol::{Operation, ResourceUri, ServiceView, SCHEME_PREFIX};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Default bound on cross-service call depth. Cycles are caught by the
/// visited set; this additionally stops acyclic A->B->C->... fan-out.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 8;

/// One interactive prompt: a human-readable message plus a JSON schema
/// describing the expected response shape. Mirrors the MCP elicitation wire
/// format without tying the context layer to one SDK.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRequest {
    pub message: String,
    pub schema: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptAction {
    Accept,
    Decline,
    Cancel,
}

/// The human's answer to a prompt. `content` is present on accept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptOutcome {
    pub action: PromptAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

/// Interaction handle for backend-initiated prompting.
///
/// The gateway never renders prompts itself; it forwards elicitation
/// requests to whatever session originated the top-level request.
#[async_trait]
pub trait PromptHandle: Send + Sync {
    async fn elicit(&self, request: PromptRequest) -> Result<PromptOutcome>;
}

/// Prompt handle for non-interactive callers: every elicitation fails.
pub struct DetachedPrompts;

#[async_trait]
impl PromptHandle for DetachedPrompts {
    async fn elicit(&self, _request: PromptRequest) -> Result<PromptOutcome> {
        Err(GatewayError::Prompt {
            reason: "no interactive session attached".to_string(),
        })
    }
}

/// Per-request propagation token.
///
/// Never mutated in place: entering a service produces a child with an
/// extended visited set, so sibling sub-calls from the same parent cannot
/// observe each other's extensions.
#[derive(Clone)]
pub struct CallContext {
    prompts: Arc<dyn PromptHandle>,
    visited: Vec<String>,
    depth: usize,
    max_depth: usize,
}

impl std::fmt::Debug for CallContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallContext")
            .field("visited", &self.visited)
            .field("depth", &self.depth)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl CallContext {
    pub fn new(prompts: Arc<dyn PromptHandle>, max_depth: usize) -> Self {
        Self {
            prompts,
            visited: Vec::new(),
            depth: 0,
            max_depth,
        }
    }

    pub fn prompts(&self) -> Arc<dyn PromptHandle> {
        self.prompts.clone()
    }

    /// Services on the current call path, outermost first.
    pub fn visited(&self) -> &[String] {
        &self.visited
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Runs the cycle and depth guards for `service` and returns the child
    /// context for the sub-call. The receiver is left untouched.
    pub(crate) fn enter(&self, service: &str) -> Result<CallContext> {
        if self.visited.iter().any(|s| s == service) {
            return Err(GatewayError::CrossServiceCycle {
                service: service.to_string(),
                chain: self.visited.clone(),
            });
        }
        if self.depth >= self.max_depth {
            return Err(GatewayError::CallDepthExceeded {
                depth: self.depth + 1,
                max: self.max_depth,
            });
        }
        let mut child = self.clone();
        child.visited.push(service.to_string());
        child.depth += 1;
        Ok(child)
    }
}

/// A [`CallContext`] bound to its dispatcher: the handle through which both
/// the front-end session and nested backend code invoke the five uniform
/// operations.
#[derive(Clone)]
pub struct GatewayContext {
    gateway: Arc<Gateway>,
    call: CallContext,
}

impl GatewayContext {
    pub(crate) fn new(gateway: Arc<Gateway>, call: CallContext) -> Self {
        Self { gateway, call }
    }

    pub fn call(&self) -> &CallContext {
        &self.call
    }

    pub fn prompts(&self) -> Arc<dyn PromptHandle> {
        self.call.prompts()
    }

    /// Surfaces a prompt on the originating session.
    pub async fn prompt(&self, request: PromptRequest) -> Result<PromptOutcome> {
        self.call.prompts.elicit(request).await
    }

    /// LIST: all service names, configuration order. No backend call.
    pub fn list(&self) -> Vec<String> {
        self.gateway.list()
    }

    /// VIEW: service description and resources.
    pub async fn view(&self, service: &str) -> Result<ServiceView> {
        self.gateway.view(service, &self.call).await
    }

    /// GET: read one resource by full identifier.
    pub async fn get(&self, uri: &str) -> Result<Value> {
        let target = ResourceUri::parse(uri)?;
        self.gateway.get(&target, &self.call).await
    }

    /// FIND: search within one service; results are full identifiers.
    pub async fn find(&self, service: &str, query: &str) -> Result<Vec<String>> {
        self.gateway.find(service, query, &self.call).await
    }

    /// POST: invoke the action resource named by the identifier.
    pub async fn post(&self, uri: &str) -> Result<Value> {
        let target = ResourceUri::parse(uri)?;
        self.gateway.post(&target, &self.call).await
    }

    /// Uniform entry point used by nested callers: dispatches `operation`
    /// against `uri` through the same path as the top-level operations.
    pub async fn request(
        &self,
        operation: Operation,
        uri: &str,
        query: Option<&str>,
    ) -> Result<Value> {
        match operation {
            Operation::List => Ok(Value::from(self.list())),
            Operation::View => {
                let service = target_service(uri)?;
                let view = self.view(&service).await?;
                serde_json::to_value(view)
                    .map_err(|err| GatewayError::protocol(&service, err))
            }
            Operation::Get => self.get(uri).await,
            Operation::Find => {
                let query = query.ok_or_else(|| GatewayError::InvalidRequest {
                    details: "FIND requires a query".to_string(),
                })?;
                let service = target_service(uri)?;
                Ok(Value::from(self.find(&service, query).await?))
            }
            Operation::Post => self.post(uri).await,
        }
    }
}

/// Accepts both target dialects used by callers: a full identifier
/// (`mcpweb://email/...`) or a bare service name (`email`, `email/`).
fn target_service(uri: &str) -> Result<String> {
    if uri.starts_with(SCHEME_PREFIX) {
        Ok(ResourceUri::parse(uri)?.service)
    } else {
        Ok(ResourceUri::service_from_path(uri)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> CallContext {
        CallContext::new(Arc::new(DetachedPrompts), DEFAULT_MAX_CALL_DEPTH)
    }

    #[test]
    fn enter_extends_child_not_parent() {
        let parent = root();
        let child = parent.enter("email").unwrap();
        assert_eq!(child.visited(), ["email"]);
        assert_eq!(child.depth(), 1);
        assert!(parent.visited().is_empty());
        assert_eq!(parent.depth(), 0);
    }

    #[test]
    fn siblings_do_not_interfere() {
        let parent = root().enter("email").unwrap();
        let a = parent.enter("calendar").unwrap();
        let b = parent.enter("documents").unwrap();
        assert_eq!(a.visited(), ["email", "calendar"]);
        assert_eq!(b.visited(), ["email", "documents"]);
    }

    #[test]
    fn revisiting_a_service_is_a_cycle() {
        let ctx = root().enter("email").unwrap().enter("calendar").unwrap();
        let err = ctx.enter("email").unwrap_err();
        match err {
            GatewayError::CrossServiceCycle { service, chain } => {
                assert_eq!(service, "email");
                assert_eq!(chain, ["email", "calendar"]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn depth_is_bounded_even_without_cycles() {
        let mut ctx = CallContext::new(Arc::new(DetachedPrompts), 3);
        for name in ["a", "b", "c"] {
            ctx = ctx.enter(name).unwrap();
        }
        let err = ctx.enter("d").unwrap_err();
        assert!(matches!(
            err,
            GatewayError::CallDepthExceeded { depth: 4, max: 3 }
        ));
    }

    #[test]
    fn target_service_accepts_both_dialects() {
        assert_eq!(target_service("mcpweb://email/x").unwrap(), "email");
        assert_eq!(target_service("email").unwrap(), "email");
        assert_eq!(target_service("email/").unwrap(), "email");
        assert!(target_service("mcpweb://").is_err());
    }
}
