//! Service registry: the static mapping from service name to connection
//! descriptor, populated once at startup and read-only afterward.

use crate::adapter::{AdapterSet, ProtocolAdapter};
use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Closed set of backend protocols the gateway can speak.
///
/// `Federated` and `Agent` are declared future variants: configuration
/// parses them, but registry build rejects them until an adapter exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    #[default]
    #[serde(alias = "native")]
    Mcp,
    Rest,
    /// In-process service mounted at startup; has no transport address.
    Inline,
    #[serde(alias = "federated-gateway")]
    Federated,
    #[serde(alias = "agent-protocol")]
    Agent,
}

impl ProtocolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolKind::Mcp => "mcp",
            ProtocolKind::Rest => "rest",
            ProtocolKind::Inline => "inline",
            ProtocolKind::Federated => "federated",
            ProtocolKind::Agent => "agent",
        }
    }
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a service lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Child process speaking MCP over stdio.
    Stdio {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
    },
    /// Remote endpoint: streamable-HTTP MCP or a REST base URL.
    Http { url: String },
    /// In-process mounted service.
    Inline,
}

/// Immutable connection descriptor for one service. Created at configuration
/// load, owned by the registry for the process lifetime.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    pub protocol: ProtocolKind,
    pub endpoint: Endpoint,
}

/// A descriptor plus the adapter selected for it at registry build time.
///
/// Selecting the adapter once here keeps per-request dispatch free of any
/// protocol inspection.
pub struct RegisteredService {
    pub descriptor: ServiceDescriptor,
    pub adapter: Arc<dyn ProtocolAdapter>,
}

impl std::fmt::Debug for RegisteredService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredService")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl RegisteredService {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

/// Name -> descriptor mapping in configuration order.
#[derive(Debug)]
pub struct ServiceRegistry {
    services: Vec<Arc<RegisteredService>>,
    index: HashMap<String, usize>,
}

impl ServiceRegistry {
    pub fn build(descriptors: Vec<ServiceDescriptor>, adapters: &AdapterSet) -> Result<Self> {
        let mut services = Vec::with_capacity(descriptors.len());
        let mut index = HashMap::with_capacity(descriptors.len());

        for descriptor in descriptors {
            if index.contains_key(&descriptor.name) {
                return Err(GatewayError::Config(format!(
                    "duplicate service name '{}'",
                    descriptor.name
                )));
            }
            let adapter = adapters.select(&descriptor)?;
            index.insert(descriptor.name.clone(), services.len());
            services.push(Arc::new(RegisteredService {
                descriptor,
                adapter,
            }));
        }

        Ok(Self { services, index })
    }

    /// The single source of truth for "does this service exist".
    pub fn lookup(&self, service: &str) -> Result<&Arc<RegisteredService>> {
        self.index
            .get(service)
            .map(|&idx| &self.services[idx])
            .ok_or_else(|| GatewayError::UnknownService {
                service: service.to_string(),
                known: self.names(),
            })
    }

    /// Service names in configuration order.
    pub fn names(&self) -> Vec<String> {
        self.services
            .iter()
            .map(|s| s.descriptor.name.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RegisteredService>> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
