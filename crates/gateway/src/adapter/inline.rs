//! Inline adapter: services mounted in-process at startup.
//!
//! Inline backends implement the service contract directly in Rust and are
//! the only backends that receive the propagated [`GatewayContext`], which
//! lets their handlers prompt the originating session and issue
//! cross-service calls through the same dispatcher that invoked them.

use crate::adapter::{split_action, BackendChannel, ProtocolAdapter};
use crate::connection::Connection;
use crate::context::GatewayContext;
use crate::error::{GatewayError, Result};
use crate::registry::ServiceDescriptor;
use async_trait::async_trait;
use mcpweb_protocol::ServiceView;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Contract an in-process service implements.
#[async_trait]
pub trait InlineBackend: Send + Sync {
    /// Usage instructions surfaced by VIEW.
    fn instructions(&self) -> String;

    /// Service-local resource paths, each starting with `/`.
    fn resources(&self) -> Vec<String>;

    /// Whether the service implements `search`. Backends without search make
    /// FIND fail with `SearchNotSupported` instead of a fault.
    fn searchable(&self) -> bool {
        true
    }

    /// Read one resource by service-local path.
    async fn read(&self, path: &str, ctx: &GatewayContext) -> Result<Value>;

    /// Return matching service-local paths for `query`.
    async fn search(&self, query: &str) -> Result<Vec<String>>;

    /// Perform `action` on the resource at `path`.
    async fn invoke(&self, action: &str, path: &str, ctx: &GatewayContext) -> Result<Value>;
}

pub struct InlineAdapter {
    backends: HashMap<String, Arc<dyn InlineBackend>>,
}

impl InlineAdapter {
    pub fn new(mounts: &[(String, Arc<dyn InlineBackend>)]) -> Self {
        Self {
            backends: mounts
                .iter()
                .map(|(name, backend)| (name.clone(), backend.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl ProtocolAdapter for InlineAdapter {
    async fn connect(&self, descriptor: &ServiceDescriptor) -> Result<BackendChannel> {
        let backend = self.backends.get(&descriptor.name).ok_or_else(|| {
            GatewayError::Config(format!(
                "inline service '{}' has no mounted backend",
                descriptor.name
            ))
        })?;
        Ok(BackendChannel::Inline(backend.clone()))
    }

    async fn list(&self, conn: &Connection) -> Result<Vec<String>> {
        Ok(conn.inline()?.resources())
    }

    async fn view(&self, conn: &Connection) -> Result<ServiceView> {
        let backend = conn.inline()?;
        Ok(ServiceView {
            service: conn.service.clone(),
            instructions: backend.instructions(),
            resources: backend.resources(),
        })
    }

    async fn get(&self, conn: &Connection, path: &str, ctx: &GatewayContext) -> Result<Value> {
        conn.inline()?.read(path, ctx).await
    }

    async fn find(&self, conn: &Connection, query: &str) -> Result<Vec<String>> {
        let backend = conn.inline()?;
        if !backend.searchable() {
            return Err(GatewayError::SearchNotSupported {
                service: conn.service.clone(),
            });
        }
        backend.search(query).await
    }

    async fn post(&self, conn: &Connection, path: &str, ctx: &GatewayContext) -> Result<Value> {
        let Some((resource, action)) = split_action(path) else {
            return Err(GatewayError::InvalidUri {
                details: format!(
                    "POST needs an action segment: 'mcpweb://{}{path}'",
                    conn.service
                ),
            });
        };
        conn.inline()?.invoke(action, resource, ctx).await
    }
}
