//! Running-summary maintenance.

use tracing::{info, warn};

use deepbrief_core::{EngineError, EngineResult, SourceRecord};
use llm_client::util::strip_thinking_tokens;
use llm_client::ChatModel;

use crate::prompts::{summarizer_user_prompt, SUMMARIZER_SYSTEM};
use crate::state::ResearchState;

/// Token budget per source rendered into the prompt, in characters
/// (~1000 tokens at ~4 chars/token).
const MAX_CHARS_PER_SOURCE: usize = 4000;

pub struct Summarizer<'a> {
    model: &'a dyn ChatModel,
}

impl<'a> Summarizer<'a> {
    pub fn new(model: &'a dyn ChatModel) -> Self {
        Self { model }
    }

    /// Extend the running summary with the newest `new_count` entries of
    /// `sources_gathered`, returning the new summary text.
    ///
    /// With zero new sources the summarizer must not synthesize anything:
    /// it appends a deterministic insufficient-sources caveat without any
    /// model call. That is the hallucination-prevention contract — no claim
    /// may be attributed to a source that does not exist.
    pub async fn extend(&self, state: &ResearchState, new_count: usize) -> EngineResult<String> {
        if new_count == 0 {
            info!(
                query = state.search_query.as_str(),
                "No validated sources, appending caveat instead of summarizing"
            );
            return Ok(with_insufficient_caveat(state));
        }

        let start = state.sources_gathered.len() - new_count;
        let rendered = render_sources(&state.sources_gathered[start..], start);
        let user = summarizer_user_prompt(state, &rendered);

        let response = self
            .model
            .complete(SUMMARIZER_SYSTEM, &user)
            .await
            .map_err(EngineError::LlmUnreachable)?;

        let summary = strip_thinking_tokens(&response);
        if summary.is_empty() {
            // An empty rewrite would shrink the summary; keep what we have.
            warn!("Summarizer returned empty text, keeping previous summary");
            return Ok(state.running_summary.clone());
        }
        Ok(summary)
    }
}

/// Render sources with their global citation numbers, truncated to the
/// per-source budget on a char boundary.
fn render_sources(records: &[SourceRecord], start_index: usize) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let content = truncate_chars(&record.content, MAX_CHARS_PER_SOURCE);
            format!(
                "[{}] {} ({})\n{}",
                start_index + i + 1,
                record.title,
                record.url,
                content,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn truncate_chars(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Deterministic caveat for a loop that exhausted its retries.
fn with_insufficient_caveat(state: &ResearchState) -> String {
    let caveat = format!(
        "> **Insufficient sources**: no sources meeting the relevance \
         threshold were found for the query \"{}\" after exhausting search \
         retries. The summary was not extended this iteration.",
        state.search_query,
    );
    if state.running_summary.is_empty() {
        caveat
    } else {
        format!("{}\n\n{}", state.running_summary, caveat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deepbrief_core::{LlmError, ProviderKind, SearchHit};
    use llm_client::ToolSpec;

    /// Panics on any call: proves the caveat path never touches the model.
    struct UnreachableModel;

    #[async_trait]
    impl ChatModel for UnreachableModel {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            panic!("summarizer must not call the model with zero sources");
        }

        async fn complete_json(
            &self,
            _system: &str,
            _user: &str,
            _schema: &serde_json::Value,
        ) -> Result<String, LlmError> {
            panic!("summarizer must not call the model with zero sources");
        }

        async fn call_tool(
            &self,
            _system: &str,
            _user: &str,
            _tool: &ToolSpec,
        ) -> Result<serde_json::Value, LlmError> {
            panic!("summarizer must not call the model with zero sources");
        }

        fn name(&self) -> &str {
            "unreachable"
        }
    }

    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, LlmError> {
            Ok(format!("<think>planning</think>Summary over: {user}"))
        }

        async fn complete_json(
            &self,
            _system: &str,
            _user: &str,
            _schema: &serde_json::Value,
        ) -> Result<String, LlmError> {
            Err(LlmError::EmptyResponse)
        }

        async fn call_tool(
            &self,
            _system: &str,
            _user: &str,
            _tool: &ToolSpec,
        ) -> Result<serde_json::Value, LlmError> {
            Err(LlmError::NoToolCall)
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn record(url: &str, content: &str) -> SourceRecord {
        SourceRecord::from_hit(
            SearchHit::new(url, "Title", content, ProviderKind::Tavily),
            0.8,
        )
    }

    #[tokio::test]
    async fn zero_sources_appends_caveat_without_model_call() {
        let mut state = ResearchState::new("topic");
        state.running_summary = "Existing facts.".to_string();
        state.search_query = "hopeless query".to_string();
        state.validation_failed_terminal = true;

        let summary = Summarizer::new(&UnreachableModel)
            .extend(&state, 0)
            .await
            .unwrap();

        assert!(summary.starts_with("Existing facts."));
        assert!(summary.contains("Insufficient sources"));
        assert!(summary.contains("hopeless query"));
    }

    #[tokio::test]
    async fn caveat_on_empty_summary_stands_alone() {
        let mut state = ResearchState::new("topic");
        state.search_query = "q".to_string();

        let summary = Summarizer::new(&UnreachableModel)
            .extend(&state, 0)
            .await
            .unwrap();
        assert!(summary.starts_with("> **Insufficient sources**"));
    }

    #[tokio::test]
    async fn new_sources_rendered_with_global_citation_numbers() {
        let mut state = ResearchState::new("topic");
        state.sources_gathered.push(record("https://old.example.com", "old"));
        state.sources_gathered.push(record("https://new.example.com", "new content"));

        let summary = Summarizer::new(&EchoModel).extend(&state, 1).await.unwrap();
        // The single new source is number 2 globally
        assert!(summary.contains("[2] Title (https://new.example.com)"));
        assert!(!summary.contains("[1] Title (https://old.example.com)"));
        assert!(!summary.contains("<think>"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(3000); // 2 bytes each
        let truncated = truncate_chars(&text, MAX_CHARS_PER_SOURCE);
        assert!(truncated.len() <= MAX_CHARS_PER_SOURCE);
        assert!(truncated.chars().all(|c| c == 'é'));
    }
}
