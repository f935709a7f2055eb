//! Wire a runnable engine from application config and per-run options.

use std::sync::Arc;

use tracing::info;

use deepbrief_core::{
    AppConfig, EngineError, EngineResult, LlmProvider, ProviderKind, ResearchOptions,
};
use llm_client::{ChatModel, LmStudio, Ollama};
use search_client::adapters::{
    ArxivProvider, DuckduckgoProvider, PerplexityProvider, SearxngProvider, TavilyProvider,
};
use search_client::{SearchGateway, SearchProvider};

use crate::engine::ResearchEngine;

/// Build a [`ResearchEngine`] from config.
///
/// Providers that need credentials reject a missing key here, at the
/// boundary, instead of failing silently during the run.
pub fn build_engine(config: &AppConfig, options: ResearchOptions) -> EngineResult<ResearchEngine> {
    options.validate()?;

    let mut providers: Vec<Arc<dyn SearchProvider>> = Vec::new();
    for kind in &options.providers {
        providers.push(match kind {
            ProviderKind::Tavily => {
                let key = require_key(&config.tavily_api_key, "TAVILY_API_KEY", *kind)?;
                Arc::new(TavilyProvider::new(key, options.fetch_full_page))
            }
            ProviderKind::Duckduckgo => Arc::new(DuckduckgoProvider::new()),
            ProviderKind::Searxng => {
                let base = require_key(&config.searxng_base_url, "SEARXNG_BASE_URL", *kind)?;
                Arc::new(SearxngProvider::new(base))
            }
            ProviderKind::Perplexity => {
                let key = require_key(&config.perplexity_api_key, "PERPLEXITY_API_KEY", *kind)?;
                Arc::new(PerplexityProvider::new(key))
            }
            ProviderKind::Arxiv => Arc::new(ArxivProvider::new()),
        });
    }

    let gateway = SearchGateway::new(
        providers,
        options.provider_timeout,
        options.results_per_provider,
    );

    info!(
        provider = ?config.llm_provider,
        model = config.llm_model.as_str(),
        "Building research engine"
    );

    let mut engine = ResearchEngine::new(chat_model(config, &config.llm_model), gateway, options)?;
    if let Some(ref name) = config.query_model {
        engine = engine.with_query_model(chat_model(config, name));
    }
    if let Some(ref name) = config.summarizer_model {
        engine = engine.with_summarizer_model(chat_model(config, name));
    }
    Ok(engine)
}

fn chat_model(config: &AppConfig, model: &str) -> Arc<dyn ChatModel> {
    match config.llm_provider {
        LlmProvider::Ollama => Arc::new(Ollama::new(&config.ollama_base_url, model)),
        LlmProvider::Lmstudio => Arc::new(LmStudio::new(&config.lmstudio_base_url, model)),
    }
}

fn require_key(
    value: &Option<String>,
    env_name: &str,
    kind: ProviderKind,
) -> EngineResult<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.clone()),
        _ => Err(EngineError::InvalidConfig(format!(
            "search provider {kind} is enabled but {env_name} is not set"
        ))),
    }
}
