use async_trait::async_trait;
use regex::Regex;

use deepbrief_core::{ProviderKind, SearchError, SearchHit};

use crate::provider::SearchProvider;

const ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";

/// arXiv adapter over the Atom query API. Hits from this provider are
/// academic sources and go through the enhanced scoring rubric downstream.
///
/// The Atom subset consumed here is fixed (entry/id/title/summary/published/
/// name), so extraction is regex-based rather than pulling in an XML parser.
pub struct ArxivProvider {
    client: reqwest::Client,
    entry_re: Regex,
    id_re: Regex,
    title_re: Regex,
    summary_re: Regex,
    published_re: Regex,
    author_re: Regex,
}

impl ArxivProvider {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            entry_re: Regex::new(r"(?s)<entry>(.*?)</entry>").expect("valid regex"),
            id_re: Regex::new(r"<id>([^<]+)</id>").expect("valid regex"),
            title_re: Regex::new(r"(?s)<title>(.*?)</title>").expect("valid regex"),
            summary_re: Regex::new(r"(?s)<summary>(.*?)</summary>").expect("valid regex"),
            published_re: Regex::new(r"<published>([^<]+)</published>").expect("valid regex"),
            author_re: Regex::new(r"<name>([^<]+)</name>").expect("valid regex"),
        }
    }

    fn parse_feed(&self, xml: &str, max_results: usize) -> Vec<SearchHit> {
        self.entry_re
            .captures_iter(xml)
            .filter_map(|entry| {
                let body = &entry[1];
                let url = self.id_re.captures(body)?[1].trim().to_string();
                let title = collapse_whitespace(&self.title_re.captures(body)?[1]);
                let abstract_text = self
                    .summary_re
                    .captures(body)
                    .map(|c| collapse_whitespace(&c[1]))
                    .unwrap_or_default();
                let published = self
                    .published_re
                    .captures(body)
                    .map(|c| c[1].trim().to_string())
                    .unwrap_or_default();
                let authors: Vec<String> = self
                    .author_re
                    .captures_iter(body)
                    .map(|c| c[1].trim().to_string())
                    .collect();

                let content = format!(
                    "arXiv paper.\nAuthors: {}\nPublished: {}\nAbstract: {}",
                    authors.join(", "),
                    published,
                    abstract_text,
                );
                Some(SearchHit::new(url, title, content, ProviderKind::Arxiv))
            })
            .take(max_results)
            .collect()
    }
}

impl Default for ArxivProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl SearchProvider for ArxivProvider {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let search_query = format!("all:{query}");
        let max = max_results.to_string();

        let response = self
            .client
            .get(ARXIV_API_URL)
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", max.as_str()),
                ("sortBy", "relevance"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await
            .map_err(|e| SearchError::Http(Box::new(e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status { status, body });
        }

        let xml = response
            .text()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;

        Ok(self.parse_feed(&xml, max_results))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Arxiv
    }
}
