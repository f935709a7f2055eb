use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use deepbrief_core::{ProviderKind, SearchError, SearchHit};

use crate::provider::SearchProvider;

const PERPLEXITY_API_URL: &str = "https://api.perplexity.ai/chat/completions";
const SEARCH_SYSTEM_PROMPT: &str =
    "Search the web and provide factual information with citations.";

/// Perplexity adapter. The API returns one synthesized answer plus citation
/// URLs; the adapter emits one hit per citation carrying the shared answer
/// text so downstream dedup and scoring operate on real URLs.
pub struct PerplexityProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct PerplexityRequest<'a> {
    model: &'a str,
    messages: Vec<PerplexityMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct PerplexityMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct PerplexityResponse {
    choices: Vec<PerplexityChoice>,
    #[serde(default)]
    citations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PerplexityChoice {
    message: PerplexityResponseMessage,
}

#[derive(Debug, Deserialize)]
struct PerplexityResponseMessage {
    #[serde(default)]
    content: String,
}

impl PerplexityProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "sonar".to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn hits_from(answer: &str, citations: Vec<String>, max_results: usize) -> Vec<SearchHit> {
        citations
            .into_iter()
            .take(max_results)
            .map(|url| {
                let host = url::Url::parse(&url)
                    .ok()
                    .and_then(|u| u.host_str().map(|h| h.to_string()))
                    .unwrap_or_else(|| "perplexity".to_string());
                SearchHit::new(
                    url,
                    format!("Perplexity citation ({host})"),
                    answer.to_string(),
                    ProviderKind::Perplexity,
                )
            })
            .collect()
    }
}

#[async_trait]
impl SearchProvider for PerplexityProvider {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let request = PerplexityRequest {
            model: &self.model,
            messages: vec![
                PerplexityMessage {
                    role: "system",
                    content: SEARCH_SYSTEM_PROMPT,
                },
                PerplexityMessage {
                    role: "user",
                    content: query,
                },
            ],
        };

        let response = self
            .client
            .post(PERPLEXITY_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SearchError::Http(Box::new(e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status { status, body });
        }

        let data: PerplexityResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;

        let answer = data
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if answer.trim().is_empty() || data.citations.is_empty() {
            return Ok(Vec::new());
        }

        Ok(Self::hits_from(&answer, data.citations, max_results))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Perplexity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_hit_per_citation_sharing_the_answer() {
        let hits = PerplexityProvider::hits_from(
            "the answer",
            vec![
                "https://a.example.com/x".to_string(),
                "https://b.example.com/y".to_string(),
            ],
            5,
        );
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "the answer");
        assert_eq!(hits[1].content, "the answer");
        assert!(hits[0].title.contains("a.example.com"));
    }

    #[test]
    fn citations_capped_at_max_results() {
        let citations = (0..10)
            .map(|i| format!("https://example.com/{i}"))
            .collect();
        let hits = PerplexityProvider::hits_from("answer", citations, 3);
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn response_parses_with_citations() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "Answer text."}}],
            "citations": ["https://a.example.com"]
        }"#;
        let parsed: PerplexityResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.citations.len(), 1);
        assert_eq!(parsed.choices[0].message.content, "Answer text.");
    }
}
