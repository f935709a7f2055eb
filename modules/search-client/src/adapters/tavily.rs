use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use deepbrief_core::{ProviderKind, SearchError, SearchHit};

use crate::provider::SearchProvider;

const TAVILY_API_URL: &str = "https://api.tavily.com/search";

/// Tavily web search adapter.
pub struct TavilyProvider {
    api_key: String,
    client: reqwest::Client,
    fetch_full_page: bool,
}

#[derive(Debug, Serialize)]
struct TavilySearchRequest {
    api_key: String,
    query: String,
    max_results: usize,
    include_raw_content: bool,
    search_depth: String,
}

#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    title: String,
    content: String,
    raw_content: Option<String>,
}

impl TavilyProvider {
    pub fn new(api_key: impl Into<String>, fetch_full_page: bool) -> Self {
        Self {
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            fetch_full_page,
        }
    }
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let request = TavilySearchRequest {
            api_key: self.api_key.clone(),
            query: query.to_string(),
            max_results,
            include_raw_content: self.fetch_full_page,
            search_depth: "advanced".to_string(),
        };

        let response = self
            .client
            .post(TAVILY_API_URL)
            .json(&request)
            .send()
            .await
            .map_err(|e| SearchError::Http(Box::new(e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status { status, body });
        }

        let data: TavilySearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;

        let hits = data
            .results
            .into_iter()
            .map(|r| {
                let content = if self.fetch_full_page {
                    r.raw_content.unwrap_or(r.content)
                } else {
                    r.content
                };
                SearchHit::new(r.url, r.title, content, ProviderKind::Tavily)
            })
            .collect();

        Ok(hits)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Tavily
    }
}
