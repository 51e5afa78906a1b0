//! Operation dispatcher: the component callers invoke.
//!
//! `Gateway` composes the registry, the connection manager, and the
//! per-service adapters into the five uniform operations. It holds no
//! business state of its own: every operation is pure forwarding plus
//! identifier bookkeeping, which is what keeps services isolated from one
//! another. Per request the path is resolve -> lookup -> acquire -> adapter
//! call; it either completes or fails, nothing partial is kept.

use crate::adapter::{AdapterSet, InlineBackend};
use crate::config::GatewayConfig;
use crate::connection::{Connection, ConnectionManager};
use crate::context::{CallContext, GatewayContext, PromptHandle, DEFAULT_MAX_CALL_DEPTH};
use crate::error::{GatewayError, Result};
use crate::registry::{Endpoint, ProtocolKind, ServiceDescriptor, ServiceRegistry};
use mcpweb_protocol::{ResourceUri, ServiceSummary, ServiceView};
use serde_json::Value;
use std::sync::Arc;

pub struct Gateway {
    registry: ServiceRegistry,
    connections: ConnectionManager,
    max_depth: usize,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    /// Creates the root context for one top-level request. Nested calls
    /// derive children from it; each top-level request gets a fresh one.
    pub fn context(self: &Arc<Self>, prompts: Arc<dyn PromptHandle>) -> GatewayContext {
        GatewayContext::new(self.clone(), CallContext::new(prompts, self.max_depth))
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// LIST: service names in configuration order. Never touches a backend,
    /// so it is idempotent for a given registry.
    pub fn list(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Registry names with protocol and connection status, for the tool
    /// surface. Still no backend calls.
    pub fn summaries(&self) -> Vec<ServiceSummary> {
        self.registry
            .iter()
            .map(|entry| ServiceSummary {
                name: entry.name().to_string(),
                protocol: entry.descriptor.protocol.to_string(),
                status: self.connections.status(entry.name()).to_string(),
            })
            .collect()
    }

    /// Drops all live backend connections. In-flight requests finish on
    /// their own handles; subsequent requests reconnect lazily.
    pub async fn shutdown(&self) {
        self.connections.shutdown().await;
    }

    pub(crate) async fn view(
        self: &Arc<Self>,
        service: &str,
        call: &CallContext,
    ) -> Result<ServiceView> {
        let entry = self.registry.lookup(service)?.clone();
        // Cycle/depth guard; VIEW itself propagates no context onward.
        call.enter(service)?;
        let conn = self.connections.acquire(&entry).await?;
        let result = entry.adapter.view(&conn).await.map(|mut view| {
            view.resources = view
                .resources
                .iter()
                .map(|raw| ResourceUri::absolutize(service, raw))
                .collect();
            view
        });
        self.finish(&conn, result, || format!("VIEW {service}")).await
    }

    pub(crate) async fn get(
        self: &Arc<Self>,
        target: &ResourceUri,
        call: &CallContext,
    ) -> Result<Value> {
        let entry = self.registry.lookup(&target.service)?.clone();
        let entered = call.enter(&target.service)?;
        let conn = self.connections.acquire(&entry).await?;
        let scope = GatewayContext::new(self.clone(), entered);
        let result = entry.adapter.get(&conn, &target.path, &scope).await;
        self.finish(&conn, result, || format!("GET {target}")).await
    }

    pub(crate) async fn find(
        self: &Arc<Self>,
        service: &str,
        query: &str,
        call: &CallContext,
    ) -> Result<Vec<String>> {
        let entry = self.registry.lookup(service)?.clone();
        call.enter(service)?;
        let conn = self.connections.acquire(&entry).await?;
        // The adapter speaks the backend's path dialect; rewriting to full
        // identifiers happens here. Ordering is preserved as ranked by the
        // backend.
        let result = entry.adapter.find(&conn, query).await.map(|paths| {
            paths
                .iter()
                .map(|raw| ResourceUri::absolutize(service, raw))
                .collect()
        });
        self.finish(&conn, result, || format!("FIND {service} {query:?}"))
            .await
    }

    pub(crate) async fn post(
        self: &Arc<Self>,
        target: &ResourceUri,
        call: &CallContext,
    ) -> Result<Value> {
        let entry = self.registry.lookup(&target.service)?.clone();
        let entered = call.enter(&target.service)?;
        let conn = self.connections.acquire(&entry).await?;
        let scope = GatewayContext::new(self.clone(), entered);
        let result = entry.adapter.post(&conn, &target.path, &scope).await;
        self.finish(&conn, result, || format!("POST {target}")).await
    }

    /// Post-call bookkeeping: a transport failure poisons this service's
    /// connection (and only this service's), so the next acquire re-dials.
    async fn finish<T>(
        &self,
        conn: &Arc<Connection>,
        result: Result<T>,
        op: impl Fn() -> String,
    ) -> Result<T> {
        if let Err(err) = &result {
            if let GatewayError::ServiceUnavailable { reason, .. } = err {
                self.connections.mark_failed(conn, reason).await;
            }
            log::debug!("{} failed: {err}", op());
        }
        result
    }
}

pub struct GatewayBuilder {
    config: Option<GatewayConfig>,
    descriptors: Vec<ServiceDescriptor>,
    mounts: Vec<(String, Arc<dyn InlineBackend>)>,
    adapters: AdapterSet,
    max_depth: usize,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self {
            config: None,
            descriptors: Vec::new(),
            mounts: Vec::new(),
            adapters: AdapterSet::standard(),
            max_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl GatewayBuilder {
    /// External service configuration (proxy services).
    pub fn configure(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Registers one descriptor directly, bypassing the configuration file.
    pub fn descriptor(mut self, descriptor: ServiceDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Mounts an in-process service. Mounted services come after configured
    /// services in LIST order.
    pub fn mount(mut self, name: impl Into<String>, backend: Arc<dyn InlineBackend>) -> Self {
        self.mounts.push((name.into(), backend));
        self
    }

    /// Replaces the adapter set; mainly a test seam.
    pub fn adapters(mut self, adapters: AdapterSet) -> Self {
        self.adapters = adapters;
        self
    }

    /// Bound on nested cross-service call depth.
    pub fn max_call_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn build(self) -> Result<Arc<Gateway>> {
        let mut descriptors = match self.config {
            Some(config) => config.into_descriptors()?,
            None => Vec::new(),
        };
        descriptors.extend(self.descriptors);
        for (name, _) in &self.mounts {
            descriptors.push(ServiceDescriptor {
                name: name.clone(),
                protocol: ProtocolKind::Inline,
                endpoint: Endpoint::Inline,
            });
        }

        let mut adapters = self.adapters;
        if !self.mounts.is_empty() {
            adapters = adapters.with(
                ProtocolKind::Inline,
                Arc::new(crate::adapter::InlineAdapter::new(&self.mounts)),
            );
        }

        let registry = ServiceRegistry::build(descriptors, &adapters)?;
        let connections = ConnectionManager::new(registry.names());
        log::info!("gateway ready with {} service(s)", registry.len());

        Ok(Arc::new(Gateway {
            registry,
            connections,
            max_depth: self.max_depth,
        }))
    }
}
