use async_trait::async_trait;
use regex::Regex;

use deepbrief_core::{ProviderKind, SearchError, SearchHit};

use crate::provider::SearchProvider;

const DDG_HTML_URL: &str = "https://html.duckduckgo.com/html/";

/// DuckDuckGo adapter over the HTML-lite endpoint. No API key; results are
/// extracted from the page markup, so content is snippet-only.
pub struct DuckduckgoProvider {
    client: reqwest::Client,
    result_re: Regex,
    snippet_re: Regex,
    tag_re: Regex,
}

impl DuckduckgoProvider {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            result_re: Regex::new(r#"class="result__a"[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#)
                .expect("valid regex"),
            snippet_re: Regex::new(r#"class="result__snippet"[^>]*>(.*?)</a>"#)
                .expect("valid regex"),
            tag_re: Regex::new(r"<[^>]+>").expect("valid regex"),
        }
    }

    fn strip_tags(&self, html: &str) -> String {
        self.tag_re.replace_all(html, "").trim().to_string()
    }

    /// Extract result links and snippets from the HTML-lite page.
    /// Links and snippets appear in the same document order; pair them by index.
    fn parse_results(&self, html: &str, max_results: usize) -> Vec<SearchHit> {
        let snippets: Vec<String> = self
            .snippet_re
            .captures_iter(html)
            .map(|c| self.strip_tags(&c[1]))
            .collect();

        self.result_re
            .captures_iter(html)
            .enumerate()
            .filter_map(|(i, c)| {
                let url = resolve_redirect(&c[1])?;
                let title = self.strip_tags(&c[2]);
                let content = snippets.get(i).cloned().unwrap_or_default();
                Some(SearchHit::new(url, title, content, ProviderKind::Duckduckgo))
            })
            .take(max_results)
            .collect()
    }
}

impl Default for DuckduckgoProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// DuckDuckGo wraps result URLs in a `/l/?uddg=<encoded>` redirect.
fn resolve_redirect(href: &str) -> Option<String> {
    let absolute = if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        href.to_string()
    };

    let parsed = url::Url::parse(&absolute).ok()?;
    if parsed.path() == "/l/" {
        return parsed
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned());
    }
    if parsed.scheme() == "http" || parsed.scheme() == "https" {
        return Some(absolute);
    }
    None
}

#[async_trait]
impl SearchProvider for DuckduckgoProvider {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let response = self
            .client
            .get(DDG_HTML_URL)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| SearchError::Http(Box::new(e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status { status, body });
        }

        let html = response
            .text()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;

        Ok(self.parse_results(&html, max_results))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Duckduckgo
    }
}
