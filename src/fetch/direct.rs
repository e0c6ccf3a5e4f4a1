// Direct strategy: a plain HTTP request with the same headers.
//
// Unconditional fallback when the render strategy is unavailable or fails.
// It will not get past an active bot challenge, but it keeps lookups
// working whenever the protection layer lets API clients through.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::FetchStrategy;
use crate::upstream::{HttpMethod, UpstreamRequest};

pub struct DirectStrategy {
    client: Client,
}

impl DirectStrategy {
    /// Create a direct strategy whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FetchStrategy for DirectStrategy {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn fetch(&self, request: &UpstreamRequest) -> Result<Value> {
        debug!(method = request.method.as_str(), url = %request.url, "Direct request");

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body_text() {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("{} {} failed", request.method.as_str(), request.url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Cristalix API returned {status}: {body}");
        }

        let text = response
            .text()
            .await
            .context("Failed to read Cristalix API response")?;
        serde_json::from_str(&text).context("Cristalix API response was not JSON")
    }
}
