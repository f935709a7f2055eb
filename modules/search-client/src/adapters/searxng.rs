use async_trait::async_trait;
use serde::Deserialize;

use deepbrief_core::{ProviderKind, SearchError, SearchHit};

use crate::provider::SearchProvider;

/// SearXNG adapter for a self-hosted instance with the JSON format enabled.
pub struct SearxngProvider {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    url: String,
    title: String,
    #[serde(default)]
    content: String,
}

impl SearxngProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SearchProvider for SearxngProvider {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let url = format!("{}/search", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json"), ("categories", "general")])
            .send()
            .await
            .map_err(|e| SearchError::Http(Box::new(e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status { status, body });
        }

        let data: SearxngResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;

        let hits = data
            .results
            .into_iter()
            .take(max_results)
            .map(|r| SearchHit::new(r.url, r.title, r.content, ProviderKind::Searxng))
            .collect();

        Ok(hits)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Searxng
    }
}
