//! `reqwest`-backed [`HttpClient`] for `http` nodes.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use procflow_core::node::NodeError;
use procflow_core::node::http::{HttpClient, HttpRequest, HttpResponse};
use procflow_types::config::EngineConfig;
use reqwest::Method;

pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Client with the configured timeout and User-Agent.
    pub fn from_config(config: &EngineConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self::new(client))
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, NodeError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| NodeError::InvalidMethod(request.method.clone()))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| NodeError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| NodeError::Transport(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl HttpClient for ReqwestHttpClient {
    fn send(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, NodeError>> + Send + '_>> {
        Box::pin(self.execute(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str, url: &str) -> HttpRequest {
        HttpRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    #[test]
    fn test_from_config_builds_client() {
        assert!(ReqwestHttpClient::from_config(&EngineConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let client = ReqwestHttpClient::from_config(&EngineConfig {
            http_timeout_secs: 2,
            ..EngineConfig::default()
        })
        .unwrap();
        // Port 9 on loopback: nothing listens, so the connect is refused.
        let err = client.send(request("GET", "http://127.0.0.1:9/")).await.unwrap_err();
        assert!(matches!(err, NodeError::Transport(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_malformed_url_is_transport_error() {
        let client = ReqwestHttpClient::from_config(&EngineConfig::default()).unwrap();
        let err = client.send(request("GET", "not a url")).await.unwrap_err();
        assert!(matches!(err, NodeError::Transport(_)));
    }
}
