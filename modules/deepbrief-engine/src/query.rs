//! Query generation: one targeted web search query per iteration, never a
//! repeat of anything in the run's history.

use chrono::Utc;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

use deepbrief_core::{EngineError, EngineResult};
use llm_client::ChatModel;

use crate::prompts::{
    query_user_prompt, ANTI_REPETITION_SUFFIX, NO_VALID_SOURCES_SUFFIX, QUERY_WRITER_SYSTEM,
};
use crate::state::ResearchState;
use crate::structured::{extract_structured, ExtractError};

/// What the LLM returns for a query request.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GeneratedQuery {
    /// The actual search query string
    pub query: String,
    /// Brief explanation of why this query is relevant
    pub rationale: String,
}

pub struct QueryGenerator<'a> {
    model: &'a dyn ChatModel,
}

impl<'a> QueryGenerator<'a> {
    pub fn new(model: &'a dyn ChatModel) -> Self {
        Self { model }
    }

    /// Produce the next query for the current loop.
    ///
    /// Loop 1 targets the topic; later loops target the knowledge gap. A
    /// duplicate proposal gets one regeneration with an anti-repetition
    /// instruction, then a deterministic variation — the loop never stalls
    /// and never repeats a normalized query.
    pub async fn next_query(&self, state: &ResearchState) -> EngineResult<GeneratedQuery> {
        let user = query_user_prompt(state, &current_date());

        if let Some(generated) = self.generate(QUERY_WRITER_SYSTEM, &user).await? {
            if !state.is_repeat_query(&generated.query) {
                return Ok(generated);
            }
            info!(query = generated.query.as_str(), "Duplicate query proposed, regenerating");

            let system = format!("{QUERY_WRITER_SYSTEM}{ANTI_REPETITION_SUFFIX}");
            if let Some(retry) = self.generate(&system, &user).await? {
                if !state.is_repeat_query(&retry.query) {
                    return Ok(retry);
                }
            }
        }

        Ok(self.deterministic_fallback(state))
    }

    /// Refined query after a validation round kept nothing.
    pub async fn refine_after_no_sources(
        &self,
        state: &ResearchState,
    ) -> EngineResult<GeneratedQuery> {
        let system = format!("{QUERY_WRITER_SYSTEM}{NO_VALID_SOURCES_SUFFIX}");
        let user = query_user_prompt(state, &current_date());

        if let Some(refined) = self.generate(&system, &user).await? {
            if !state.is_repeat_query(&refined.query) {
                return Ok(refined);
            }
        }

        // Deterministic refinement: qualify the failing query. Appending to
        // the previous query keeps successive refinements distinct.
        let mut query = format!("{} academic research scholarly", state.search_query);
        if state.is_repeat_query(&query) {
            query = format!("{query} {}", state.query_history.len() + 1);
        }
        Ok(GeneratedQuery {
            query,
            rationale: "deterministic refinement after no sources passed validation".to_string(),
        })
    }

    async fn generate(&self, system: &str, user: &str) -> EngineResult<Option<GeneratedQuery>> {
        match extract_structured::<GeneratedQuery>(
            self.model,
            system,
            user,
            "search_query",
            "Generate a query for web search.",
        )
        .await
        {
            Ok(generated) if !generated.query.trim().is_empty() => Ok(Some(generated)),
            Ok(_) => Ok(None),
            Err(ExtractError::Parse(e)) => {
                warn!(error = %e, "Query generation parse failure, using fallback");
                Ok(None)
            }
            Err(ExtractError::Llm(e)) => Err(EngineError::LlmUnreachable(e)),
        }
    }

    /// Raw topic on loop 1, raw knowledge gap afterwards, varied until it is
    /// no longer a repeat.
    fn deterministic_fallback(&self, state: &ResearchState) -> GeneratedQuery {
        let mut query = if state.knowledge_gap.is_empty() {
            state.topic.clone()
        } else {
            state.knowledge_gap.clone()
        };
        if state.is_repeat_query(&query) {
            query = format!("{} {}", state.topic, state.knowledge_gap)
                .trim()
                .to_string();
        }
        if state.is_repeat_query(&query) {
            query = format!("{query} follow-up {}", state.query_history.len() + 1);
        }
        GeneratedQuery {
            query,
            rationale: "fallback after structured-output failure".to_string(),
        }
    }
}

fn current_date() -> String {
    Utc::now().format("%B %d, %Y").to_string()
}
