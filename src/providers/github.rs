use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde_json::Value;

use super::{ApiResponse, TargetApi};

const USER_AGENT: &str = concat!("trello2gh/", env!("CARGO_PKG_VERSION"));

/// GitHub REST client. Every call is a single request; failures come
/// back as an [`ApiResponse`] with the status GitHub sent.
pub struct GitHubTarget {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl GitHubTarget {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    fn request(&self, method: Method, resource: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{resource}", self.base_url))
            .header("Authorization", format!("token {}", self.token))
            // classic projects still need the inertia preview
            .header(
                "Accept",
                "application/vnd.github+json, application/vnd.github.inertia-preview+json",
            )
            .header("User-Agent", USER_AGENT)
    }

    async fn send(&self, method: Method, resource: &str, payload: Option<Value>) -> Result<ApiResponse> {
        let mut request = self.request(method.clone(), resource);
        if let Some(payload) = payload {
            request = request.json(&payload);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("GitHub {method} {resource} failed"))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read GitHub response for {resource}"))?;
        // 204 and some error pages have no JSON body
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        tracing::debug!(%method, resource, status, "github");
        Ok(ApiResponse { status, body })
    }
}

#[async_trait]
impl TargetApi for GitHubTarget {
    async fn create(&self, resource: &str, payload: Value) -> Result<ApiResponse> {
        self.send(Method::POST, resource, Some(payload)).await
    }

    async fn update(&self, resource: &str, payload: Value) -> Result<ApiResponse> {
        self.send(Method::PATCH, resource, Some(payload)).await
    }

    async fn list(&self, resource: &str) -> Result<ApiResponse> {
        self.send(Method::GET, resource, None).await
    }

    async fn delete(&self, resource: &str) -> Result<ApiResponse> {
        self.send(Method::DELETE, resource, None).await
    }
}
