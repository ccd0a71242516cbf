//! HTTP client for the web search endpoint.
//!
//! The endpoint takes `{"query": ...}` and answers with `{query, results}`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::config::SearchConfig;
use crate::domain::traits::SearchProvider;
use crate::domain::types::SearchResponse;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
}

#[derive(Debug, Clone)]
pub struct HttpSearchClient {
    client: Client,
    endpoint: String,
}

impl HttpSearchClient {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl SearchProvider for HttpSearchClient {
    async fn search(&self, query: &str) -> Result<SearchResponse> {
        debug!("Searching: {}", query);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SearchRequest { query })
            .send()
            .await
            .context("Search request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Search API returned {}: {}", status, body);
            anyhow::bail!("Search API failed: {}", status);
        }

        let mut parsed: SearchResponse = response
            .json()
            .await
            .context("Failed to parse search response")?;
        if parsed.query.is_empty() {
            parsed.query = query.to_string();
        }
        Ok(parsed)
    }
}
