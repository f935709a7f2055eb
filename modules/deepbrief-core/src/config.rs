use std::time::Duration;

use crate::error::{EngineError, EngineResult};
use crate::types::ProviderKind;

/// Which local LLM runtime serves the chat API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Ollama,
    Lmstudio,
}

impl std::str::FromStr for LlmProvider {
    type Err = EngineError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ollama" => Ok(Self::Ollama),
            "lmstudio" => Ok(Self::Lmstudio),
            _ => Err(EngineError::InvalidConfig(format!(
                "unknown LLM provider: {s} (expected ollama or lmstudio)"
            ))),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Contains endpoints, API keys, and model assignments; per-run knobs live
/// in [`ResearchOptions`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    // LLM runtime
    pub llm_provider: LlmProvider,
    pub llm_model: String,
    pub ollama_base_url: String,
    pub lmstudio_base_url: String,

    // Per-component model overrides (fall back to llm_model)
    pub query_model: Option<String>,
    pub summarizer_model: Option<String>,

    // Search backends
    pub tavily_api_key: Option<String>,
    pub perplexity_api_key: Option<String>,
    pub searxng_base_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();

        let llm_provider = std::env::var("LLM_PROVIDER")
            .unwrap_or_else(|_| "ollama".to_string())
            .parse()?;

        let config = Self {
            llm_provider,
            llm_model: std::env::var("LLM_MODEL").unwrap_or_else(|_| "llama3.2".to_string()),
            ollama_base_url: std::env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            lmstudio_base_url: std::env::var("LMSTUDIO_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:1234/v1".to_string()),
            query_model: std::env::var("QUERY_MODEL").ok(),
            summarizer_model: std::env::var("SUMMARIZER_MODEL").ok(),
            tavily_api_key: std::env::var("TAVILY_API_KEY").ok(),
            perplexity_api_key: std::env::var("PERPLEXITY_API_KEY").ok(),
            searxng_base_url: std::env::var("SEARXNG_BASE_URL").ok(),
        };

        config.log_keys();
        Ok(config)
    }

    fn log_keys(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => {
                    let n = v.len().min(5);
                    format!("{}...({} chars)", &v[..n], v.len())
                }
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  LLM_PROVIDER: {:?}", self.llm_provider);
        tracing::info!("  LLM_MODEL: {}", self.llm_model);
        tracing::info!("  TAVILY_API_KEY: {}", preview_opt(&self.tavily_api_key));
        tracing::info!(
            "  PERPLEXITY_API_KEY: {}",
            preview_opt(&self.perplexity_api_key)
        );
        tracing::info!("  SEARXNG_BASE_URL: {}", preview_opt(&self.searxng_base_url));
    }
}

/// Weights for the enhanced academic scoring rubric.
///
/// The qualitative criteria (methodology, recency) come back from the scoring
/// call as booleans; these weights turn them into a deterministic bonus on
/// top of the generic relevance score, clamped to 1.0.
#[derive(Debug, Clone, Copy)]
pub struct RubricWeights {
    pub methodology_bonus: f32,
    pub recency_bonus: f32,
}

impl Default for RubricWeights {
    fn default() -> Self {
        Self {
            methodology_bonus: 0.1,
            recency_bonus: 0.1,
        }
    }
}

/// Per-run knobs, validated at the engine boundary before the loop starts.
#[derive(Debug, Clone)]
pub struct ResearchOptions {
    /// Research depth: full loops to run. Valid range 1–5.
    pub max_loops: u32,
    /// Minimum relevance score (0–1) to accept a source.
    pub min_source_relevance_score: f32,
    /// Search retries per loop when no source passes validation.
    pub max_source_retries: u32,
    /// Enabled search backends, in merge-priority order.
    pub providers: Vec<ProviderKind>,
    /// Results requested from each provider per query.
    pub results_per_provider: usize,
    /// Ask providers for full page content where supported.
    pub fetch_full_page: bool,
    /// Honor the reflector's is_sufficient signal and stop early.
    pub allow_early_exit: bool,
    /// Per-provider search timeout.
    pub provider_timeout: Duration,
    pub rubric: RubricWeights,
}

impl Default for ResearchOptions {
    fn default() -> Self {
        Self {
            max_loops: 3,
            min_source_relevance_score: 0.5,
            max_source_retries: 2,
            providers: vec![ProviderKind::Tavily],
            results_per_provider: 3,
            fetch_full_page: false,
            allow_early_exit: false,
            provider_timeout: Duration::from_secs(30),
            rubric: RubricWeights::default(),
        }
    }
}

impl ResearchOptions {
    pub fn validate(&self) -> EngineResult<()> {
        if !(1..=5).contains(&self.max_loops) {
            return Err(EngineError::InvalidConfig(format!(
                "max_loops must be between 1 and 5, got {}",
                self.max_loops
            )));
        }
        if !(0.0..=1.0).contains(&self.min_source_relevance_score) {
            return Err(EngineError::InvalidConfig(format!(
                "min_source_relevance_score must be in [0.0, 1.0], got {}",
                self.min_source_relevance_score
            )));
        }
        if self.providers.is_empty() {
            return Err(EngineError::InvalidConfig(
                "at least one search provider must be enabled".to_string(),
            ));
        }
        if self.results_per_provider == 0 {
            return Err(EngineError::InvalidConfig(
                "results_per_provider must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let opts = ResearchOptions::default();
        assert!(opts.validate().is_ok());
        assert_eq!(opts.max_loops, 3);
        assert_eq!(opts.min_source_relevance_score, 0.5);
        assert_eq!(opts.max_source_retries, 2);
    }

    #[test]
    fn max_loops_bounds_enforced() {
        let mut opts = ResearchOptions::default();
        opts.max_loops = 0;
        assert!(opts.validate().is_err());
        opts.max_loops = 6;
        assert!(opts.validate().is_err());
        opts.max_loops = 5;
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn empty_provider_set_rejected() {
        let mut opts = ResearchOptions::default();
        opts.providers.clear();
        assert!(opts.validate().is_err());
    }

    #[test]
    fn relevance_score_range_enforced() {
        let mut opts = ResearchOptions::default();
        opts.min_source_relevance_score = 1.5;
        assert!(opts.validate().is_err());
        opts.min_source_relevance_score = -0.1;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn llm_provider_parses() {
        assert_eq!("ollama".parse::<LlmProvider>().unwrap(), LlmProvider::Ollama);
        assert_eq!(
            "lmstudio".parse::<LlmProvider>().unwrap(),
            LlmProvider::Lmstudio
        );
        assert!("openai".parse::<LlmProvider>().is_err());
    }
}
