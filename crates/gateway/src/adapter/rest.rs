//! REST adapter.
//!
//! Maps the uniform operations onto a conventional JSON-over-HTTP backend:
//! `view` reads the service root, `get`/`post` address `{base}{path}`, and
//! `find` queries `{base}/search?q=`. HTTP has no session to introspect, so
//! `list` returns nothing and connecting is cheap; reachability is observed
//! per request.

use crate::adapter::{BackendChannel, ProtocolAdapter};
use crate::connection::Connection;
use crate::context::GatewayContext;
use crate::error::{GatewayError, Result};
use crate::registry::{Endpoint, ServiceDescriptor};
use async_trait::async_trait;
use mcpweb_protocol::ServiceView;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Live channel to one REST backend: a base URL plus a pooled HTTP client.
pub struct RestChannel {
    base: String,
    http: reqwest::Client,
}

impl RestChannel {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }
}

#[derive(Default)]
pub struct RestAdapter;

#[async_trait]
impl ProtocolAdapter for RestAdapter {
    async fn connect(&self, descriptor: &ServiceDescriptor) -> Result<BackendChannel> {
        let Endpoint::Http { url } = &descriptor.endpoint else {
            return Err(GatewayError::protocol(
                &descriptor.name,
                "rest services need an http endpoint",
            ));
        };
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| GatewayError::unavailable(&descriptor.name, err))?;
        Ok(BackendChannel::Rest(RestChannel {
            base: url.trim_end_matches('/').to_string(),
            http,
        }))
    }

    async fn list(&self, _conn: &Connection) -> Result<Vec<String>> {
        // No introspection over plain HTTP.
        Ok(Vec::new())
    }

    async fn view(&self, conn: &Connection) -> Result<ServiceView> {
        let chan = conn.rest()?;
        let body = fetch(&conn.service, chan.http.get(chan.url("/"))).await?;

        let instructions = body
            .get("instructions")
            .or_else(|| body.get("description"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let resources = body
            .get("resources")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(ServiceView {
            service: conn.service.clone(),
            instructions,
            resources,
        })
    }

    async fn get(&self, conn: &Connection, path: &str, _ctx: &GatewayContext) -> Result<Value> {
        let chan = conn.rest()?;
        fetch(&conn.service, chan.http.get(chan.url(path))).await
    }

    async fn find(&self, conn: &Connection, query: &str) -> Result<Vec<String>> {
        let chan = conn.rest()?;
        let response = chan
            .http
            .get(chan.url("/search"))
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|err| map_transport_error(&conn.service, err))?;

        // A backend without a search endpoint is a capability gap, not a
        // fault.
        if matches!(
            response.status(),
            reqwest::StatusCode::NOT_FOUND | reqwest::StatusCode::METHOD_NOT_ALLOWED
        ) {
            return Err(GatewayError::SearchNotSupported {
                service: conn.service.clone(),
            });
        }

        let body = decode(&conn.service, response).await?;
        let Value::Array(items) = body else {
            return Err(GatewayError::protocol(
                &conn.service,
                "search returned a non-list result",
            ));
        };
        items
            .into_iter()
            .map(|item| match item {
                Value::String(path) => Ok(path),
                other => Err(GatewayError::protocol(
                    &conn.service,
                    format!("search returned a non-string entry: {other}"),
                )),
            })
            .collect()
    }

    async fn post(&self, conn: &Connection, path: &str, _ctx: &GatewayContext) -> Result<Value> {
        let chan = conn.rest()?;
        fetch(
            &conn.service,
            chan.http.post(chan.url(path)).json(&serde_json::json!({})),
        )
        .await
    }
}

async fn fetch(service: &str, request: reqwest::RequestBuilder) -> Result<Value> {
    let response = request
        .send()
        .await
        .map_err(|err| map_transport_error(service, err))?;
    decode(service, response).await
}

async fn decode(service: &str, response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| map_transport_error(service, err))?;

    if !status.is_success() {
        let details = if text.is_empty() {
            format!("backend returned {status}")
        } else {
            format!("backend returned {status}: {text}")
        };
        return Err(GatewayError::protocol(service, details));
    }
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

/// Connectivity and timeout failures are transport-level; everything that
/// produced a response is judged by status in `decode`.
fn map_transport_error(service: &str, err: reqwest::Error) -> GatewayError {
    GatewayError::unavailable(service, err)
}
