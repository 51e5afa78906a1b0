use mcpweb_protocol::UriError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Error taxonomy for every gateway operation.
///
/// Each variant carries a stable kind tag (see [`GatewayError::kind`]) so
/// callers, including nested cross-service callers, can branch on the kind
/// instead of parsing messages.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Malformed composite identifier or an identifier that is invalid for
    /// the requested operation. Local, never retried.
    #[error("invalid identifier: {details}")]
    InvalidUri { details: String },

    /// Caller misuse that is not an identifier problem (e.g. FIND with no
    /// query).
    #[error("invalid request: {details}")]
    InvalidRequest { details: String },

    #[error("service '{service}' not found. Available services: {}", known.join(", "))]
    UnknownService { service: String, known: Vec<String> },

    /// Transport-level failure reaching the backend. The connection is
    /// marked failed; the next acquire reconnects.
    #[error("service '{service}' is unavailable: {reason}")]
    ServiceUnavailable { service: String, reason: String },

    /// The backend responded but violated the expected contract.
    #[error("service '{service}' protocol error: {details}")]
    Protocol { service: String, details: String },

    #[error("service '{service}' does not support search")]
    SearchNotSupported { service: String },

    /// A nested call re-entered a service already on the call path.
    #[error("cross-service cycle: '{service}' is already on the call path [{}]", chain.join(" -> "))]
    CrossServiceCycle { service: String, chain: Vec<String> },

    /// Acyclic but too-deep fan-out; the depth bound is configurable on the
    /// gateway builder.
    #[error("cross-service call depth {depth} exceeds the maximum of {max}")]
    CallDepthExceeded { depth: usize, max: usize },

    /// Declared-but-unimplemented protocol variant; rejected at registry
    /// build time, never mid-request.
    #[error("service '{service}' uses protocol '{protocol}', which is not supported yet")]
    UnsupportedProtocol { service: String, protocol: String },

    /// Startup-time configuration problem.
    #[error("configuration error: {0}")]
    Config(String),

    /// The interactive session could not answer a prompt.
    #[error("interactive prompt failed: {reason}")]
    Prompt { reason: String },
}

impl GatewayError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidUri { .. } => "invalid_uri",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::UnknownService { .. } => "unknown_service",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Protocol { .. } => "protocol_error",
            Self::SearchNotSupported { .. } => "search_not_supported",
            Self::CrossServiceCycle { .. } => "cross_service_cycle",
            Self::CallDepthExceeded { .. } => "call_depth_exceeded",
            Self::UnsupportedProtocol { .. } => "unsupported_protocol",
            Self::Config(_) => "config_error",
            Self::Prompt { .. } => "prompt_failed",
        }
    }

    /// The service the error is about, when there is one.
    pub fn service(&self) -> Option<&str> {
        match self {
            Self::UnknownService { service, .. }
            | Self::ServiceUnavailable { service, .. }
            | Self::Protocol { service, .. }
            | Self::SearchNotSupported { service }
            | Self::CrossServiceCycle { service, .. }
            | Self::UnsupportedProtocol { service, .. } => Some(service),
            _ => None,
        }
    }

    pub(crate) fn unavailable(service: &str, reason: impl std::fmt::Display) -> Self {
        Self::ServiceUnavailable {
            service: service.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn protocol(service: &str, details: impl std::fmt::Display) -> Self {
        Self::Protocol {
            service: service.to_string(),
            details: details.to_string(),
        }
    }
}

impl From<UriError> for GatewayError {
    fn from(err: UriError) -> Self {
        GatewayError::InvalidUri {
            details: err.to_string(),
        }
    }
}
