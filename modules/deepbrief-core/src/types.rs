use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Enum for search backend adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Tavily,
    Duckduckgo,
    Searxng,
    Perplexity,
    Arxiv,
}

impl ProviderKind {
    /// Academic repositories get the enhanced scoring rubric.
    pub fn is_academic(&self) -> bool {
        matches!(self, Self::Arxiv)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tavily => write!(f, "tavily"),
            Self::Duckduckgo => write!(f, "duckduckgo"),
            Self::Searxng => write!(f, "searxng"),
            Self::Perplexity => write!(f, "perplexity"),
            Self::Arxiv => write!(f, "arxiv"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = crate::error::EngineError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tavily" => Ok(Self::Tavily),
            "duckduckgo" => Ok(Self::Duckduckgo),
            "searxng" => Ok(Self::Searxng),
            "perplexity" => Ok(Self::Perplexity),
            "arxiv" => Ok(Self::Arxiv),
            _ => Err(crate::error::EngineError::InvalidConfig(format!(
                "unknown search provider: {s}"
            ))),
        }
    }
}

/// Unscored candidate returned by a search adapter — the universal currency
/// of the gateway. Content may be a snippet or the full page depending on
/// provider capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub content: String,
    pub provider: ProviderKind,
}

impl SearchHit {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        provider: ProviderKind,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
            provider,
        }
    }

    /// Check if this hit carries meaningful content.
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// A validated, scored source accepted into the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub url: String,
    pub title: String,
    pub content: String,
    pub provider: ProviderKind,
    /// Topical relevance in [0.0, 1.0], set by the validator.
    pub relevance_score: f32,
    pub is_academic: bool,
    pub gathered_at: DateTime<Utc>,
}

impl SourceRecord {
    pub fn from_hit(hit: SearchHit, relevance_score: f32) -> Self {
        let is_academic = hit.provider.is_academic();
        Self {
            url: hit.url,
            title: hit.title,
            content: hit.content,
            provider: hit.provider,
            relevance_score,
            is_academic,
            gathered_at: Utc::now(),
        }
    }
}

/// One entry in the final citation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    pub title: String,
}

/// Output of a completed research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchReport {
    /// Markdown: the running summary plus the rendered citation list.
    pub summary: String,
    /// Deduplicated, in gathering order.
    pub sources: Vec<Citation>,
    pub loops_completed: u32,
    /// No source met the relevance threshold at any point in the run.
    pub insufficient_sources: bool,
    /// The run was cancelled at a loop boundary before reaching full depth.
    pub aborted: bool,
}
