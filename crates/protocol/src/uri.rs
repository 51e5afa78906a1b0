//! Composite identifier parsing.
//!
//! The gateway addresses every resource with `mcpweb://service[/path]`.
//! Parsing is pure: this module never checks whether a service actually
//! exists (that is the registry's job), which keeps it trivially testable.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// URI scheme for all gateway identifiers.
pub const SCHEME: &str = "mcpweb";
/// Scheme plus separator, the prefix every identifier must carry.
pub const SCHEME_PREFIX: &str = "mcpweb://";
pub const PATH_SEPARATOR: char = '/';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UriError {
    #[error("'{uri}' does not match 'mcpweb://service[/path]'")]
    MissingScheme { uri: String },

    #[error("'{uri}' has an empty service name")]
    EmptyService { uri: String },
}

/// A parsed `mcpweb://service/path` identifier.
///
/// `path` always starts with `/` and defaults to `/` when the identifier
/// names only a service. Ephemeral value type; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ResourceUri {
    pub service: String,
    pub path: String,
}

impl ResourceUri {
    /// Parses a composite identifier. Any input not matching
    /// `mcpweb://<nonempty-service>[/<path>]` is rejected.
    pub fn parse(uri: &str) -> Result<ResourceUri, UriError> {
        let remainder = uri
            .strip_prefix(SCHEME_PREFIX)
            .ok_or_else(|| UriError::MissingScheme {
                uri: uri.to_string(),
            })?;

        let (service, path) = match remainder.find(PATH_SEPARATOR) {
            Some(idx) => (&remainder[..idx], &remainder[idx..]),
            None => (remainder, "/"),
        };

        if service.is_empty() {
            return Err(UriError::EmptyService {
                uri: uri.to_string(),
            });
        }

        Ok(ResourceUri {
            service: service.to_string(),
            path: if path.is_empty() {
                "/".to_string()
            } else {
                path.to_string()
            },
        })
    }

    /// Rewrites a backend-local path into a full identifier for `service`.
    ///
    /// Backends speak their own path dialect: some return `/thread/42`, some
    /// already return full `mcpweb://` identifiers, and some return bare
    /// `thread/42` fragments. All three forms normalize to
    /// `mcpweb://service/...`; already-qualified identifiers pass through
    /// unchanged.
    pub fn absolutize(service: &str, raw: &str) -> String {
        if raw.starts_with(SCHEME_PREFIX) {
            return raw.to_string();
        }
        if let Some(rest) = raw.strip_prefix('/') {
            return format!("{SCHEME_PREFIX}{service}/{rest}");
        }
        // Bare fragment, possibly in a foreign `scheme://` dialect: keep only
        // the part after the separator so `email://thread/42` maps onto this
        // service's namespace rather than nesting schemes.
        if let Some((_, rest)) = raw.split_once("://") {
            return format!("{SCHEME_PREFIX}{service}/{rest}");
        }
        format!("{SCHEME_PREFIX}{service}/{raw}")
    }

    /// Extracts the service name from the search-path dialect accepted by the
    /// tool surface: `"email/"`, `"email"`, or `"mcpweb://email/"`.
    pub fn service_from_path(path: &str) -> Result<String, UriError> {
        let trimmed = path.trim_end_matches(PATH_SEPARATOR);
        if trimmed.starts_with(SCHEME_PREFIX) {
            return Ok(ResourceUri::parse(trimmed)?.service);
        }
        if trimmed.is_empty() {
            return Err(UriError::EmptyService {
                uri: path.to_string(),
            });
        }
        Ok(trimmed.to_string())
    }
}

impl std::fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path == "/" {
            write!(f, "{SCHEME_PREFIX}{}", self.service)
        } else {
            write!(f, "{SCHEME_PREFIX}{}{}", self.service, self.path)
        }
    }
}

impl std::str::FromStr for ResourceUri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceUri::parse(s)
    }
}
