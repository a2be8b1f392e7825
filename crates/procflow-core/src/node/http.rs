//! `http` node: issues a request through an injected [`HttpClient`].
//!
//! Properties:
//! - `url` (required)
//! - `method` (default `GET`)
//! - `body` (optional)
//! - `header.<name>` (one request header per entry)
//!
//! The result is `{statusCode, body, headers}`. Transport failures and
//! error statuses (4xx/5xx) fail the node.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use procflow_types::graph::Node;
use serde_json::{Value, json};

use super::{DependencyResults, NodeError, NodeExecutor};

const HEADER_PREFIX: &str = "header.";

const METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// Outbound HTTP capability. Implemented in infra with `reqwest`.
pub trait HttpClient: Send + Sync {
    fn send(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, NodeError>> + Send + '_>>;
}

pub struct HttpNodeExecutor {
    client: Arc<dyn HttpClient>,
}

impl HttpNodeExecutor {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }

    /// Translate node properties into a request.
    pub fn build_request(node: &Node) -> Result<HttpRequest, NodeError> {
        let url = node
            .property("url")
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(NodeError::MissingProperty("url"))?;

        let method = node.property("method").unwrap_or("GET").trim().to_uppercase();
        if !METHODS.contains(&method.as_str()) {
            return Err(NodeError::InvalidMethod(method));
        }

        let headers = node
            .properties
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(HEADER_PREFIX)
                    .filter(|name| !name.is_empty())
                    .map(|name| (name.to_string(), value.clone()))
            })
            .collect();

        let body = node
            .property("body")
            .filter(|b| !b.is_empty())
            .map(str::to_string);

        Ok(HttpRequest {
            method,
            url: url.to_string(),
            headers,
            body,
        })
    }
}

impl NodeExecutor for HttpNodeExecutor {
    fn node_types(&self) -> &[&'static str] {
        &["http"]
    }

    async fn execute(&self, node: &Node, _deps: &DependencyResults) -> Result<Value, NodeError> {
        let request = Self::build_request(node)?;
        tracing::debug!(
            node_id = node.id.as_str(),
            method = request.method.as_str(),
            url = request.url.as_str(),
            "sending HTTP request"
        );

        let response = self.client.send(request).await?;
        if response.status >= 400 {
            return Err(NodeError::ErrorStatus(response.status));
        }

        Ok(json!({
            "statusCode": response.status,
            "body": response.body,
            "headers": response.headers,
        }))
    }
}
