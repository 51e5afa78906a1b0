//! McpWeb gateway core.
//!
//! Aggregates independent backend services behind the uniform five-operation
//! interface (LIST, VIEW, GET, FIND, POST). The moving parts:
//!
//! - [`registry::ServiceRegistry`] - name -> descriptor, fixed at startup
//! - [`adapter`] - protocol adapters (native MCP, REST, in-process)
//! - [`connection::ConnectionManager`] - one lazy, reusable channel per service
//! - [`dispatcher::Gateway`] - resolve -> lookup -> acquire -> adapter call
//! - [`context`] - per-request propagation with cycle and depth guards
//!
//! Failure isolation is structural: each service owns its connection slot,
//! so one backend failing never touches another backend's state.

pub mod adapter;
pub mod config;
pub mod connection;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod registry;

pub use adapter::{AdapterSet, InlineBackend, ProtocolAdapter};
pub use config::GatewayConfig;
pub use connection::{Connection, ConnectionManager, ConnectionStatus};
pub use context::{
    CallContext, DetachedPrompts, GatewayContext, PromptAction, PromptHandle, PromptOutcome,
    PromptRequest, DEFAULT_MAX_CALL_DEPTH,
};
pub use dispatcher::{Gateway, GatewayBuilder};
pub use error::{GatewayError, Result};
pub use registry::{Endpoint, ProtocolKind, ServiceDescriptor, ServiceRegistry};
