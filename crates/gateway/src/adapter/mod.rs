//! Protocol adapters: translators between the five uniform operations and a
//! backend's native calling convention.
//!
//! One concrete adapter exists per [`ProtocolKind`]; the registry selects it
//! once at build time. Adapters never retry: transport failures surface as
//! `ServiceUnavailable`, contract violations as `Protocol`, and the
//! dispatcher decides isolation and propagation.

pub mod inline;
pub mod mcp;
pub mod rest;

pub use inline::{InlineAdapter, InlineBackend};
pub use mcp::McpAdapter;
pub use rest::RestAdapter;

use crate::connection::Connection;
use crate::context::GatewayContext;
use crate::error::{GatewayError, Result};
use crate::registry::{ProtocolKind, ServiceDescriptor};
use async_trait::async_trait;
use mcpweb_protocol::ServiceView;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Live channel to one backend, produced by that backend's adapter and owned
/// by the connection manager.
pub enum BackendChannel {
    Mcp(mcp::McpChannel),
    Rest(rest::RestChannel),
    Inline(Arc<dyn InlineBackend>),
}

impl std::fmt::Debug for BackendChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendChannel::Mcp(_) => f.write_str("BackendChannel::Mcp"),
            BackendChannel::Rest(_) => f.write_str("BackendChannel::Rest"),
            BackendChannel::Inline(_) => f.write_str("BackendChannel::Inline"),
        }
    }
}

#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// Establishes a fresh channel. Called lazily by the connection manager
    /// on first use, and again after a failure.
    async fn connect(&self, descriptor: &ServiceDescriptor) -> Result<BackendChannel>;

    /// Service-level discovery. Protocols without introspection return an
    /// empty sequence rather than failing.
    async fn list(&self, conn: &Connection) -> Result<Vec<String>>;

    async fn view(&self, conn: &Connection) -> Result<ServiceView>;

    /// The only read operation that must support backend-initiated
    /// prompting via `ctx`.
    async fn get(&self, conn: &Connection, path: &str, ctx: &GatewayContext) -> Result<Value>;

    /// Returns service-local paths in the backend's own dialect; rewriting
    /// them to full identifiers is the dispatcher's job.
    async fn find(&self, conn: &Connection, query: &str) -> Result<Vec<String>>;

    /// Same wiring as `get`, used for state-changing action resources.
    async fn post(&self, conn: &Connection, path: &str, ctx: &GatewayContext) -> Result<Value>;
}

/// The adapters available to a registry build, keyed by protocol.
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: HashMap<ProtocolKind, Arc<dyn ProtocolAdapter>>,
}

impl AdapterSet {
    /// The built-in adapters: native MCP and REST.
    pub fn standard() -> Self {
        Self::default()
            .with(ProtocolKind::Mcp, Arc::new(McpAdapter::default()))
            .with(ProtocolKind::Rest, Arc::new(RestAdapter::default()))
    }

    pub fn with(mut self, kind: ProtocolKind, adapter: Arc<dyn ProtocolAdapter>) -> Self {
        self.adapters.insert(kind, adapter);
        self
    }

    pub(crate) fn select(
        &self,
        descriptor: &ServiceDescriptor,
    ) -> Result<Arc<dyn ProtocolAdapter>> {
        self.adapters
            .get(&descriptor.protocol)
            .cloned()
            .ok_or_else(|| GatewayError::UnsupportedProtocol {
                service: descriptor.name.clone(),
                protocol: descriptor.protocol.to_string(),
            })
    }
}

/// Splits an action path into (resource path, action name): the final
/// segment names the action, everything before it names the resource.
/// `/thread/42/reply` -> (`/thread/42`, `reply`); `/refresh` -> (`/`, `refresh`).
pub(crate) fn split_action(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.trim_end_matches('/');
    let idx = trimmed.rfind('/')?;
    let action = &trimmed[idx + 1..];
    if action.is_empty() {
        return None;
    }
    let resource = if idx == 0 { "/" } else { &trimmed[..idx] };
    Some((resource, action))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_action_takes_the_last_segment() {
        assert_eq!(split_action("/thread/42/reply"), Some(("/thread/42", "reply")));
        assert_eq!(split_action("/refresh"), Some(("/", "refresh")));
        assert_eq!(split_action("/event/evt_001/reschedule/"), Some(("/event/evt_001", "reschedule")));
        assert_eq!(split_action("/"), None);
        assert_eq!(split_action(""), None);
    }
}
