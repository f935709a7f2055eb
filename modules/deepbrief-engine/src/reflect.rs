//! Gap reflection over the running summary.

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::warn;

use deepbrief_core::{EngineError, EngineResult};
use llm_client::ChatModel;

use crate::prompts::{reflection_user_prompt, REFLECTION_SYSTEM};
use crate::state::ResearchState;
use crate::structured::{extract_structured, ExtractError};

/// What the reflector returns for one audit of the summary.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct Reflection {
    /// What information is missing or needs clarification
    pub knowledge_gap: String,
    /// The summary already covers the topic well enough to stop early
    #[serde(default)]
    pub is_sufficient: bool,
}

pub struct Reflector<'a> {
    model: &'a dyn ChatModel,
}

impl<'a> Reflector<'a> {
    pub fn new(model: &'a dyn ChatModel) -> Self {
        Self { model }
    }

    /// Analyze the running summary for the most important knowledge gap.
    ///
    /// A parse failure after the full fallback chain degrades to a
    /// deterministic gap restating the topic — never a fatal error, and the
    /// run still completes within its configured depth.
    pub async fn reflect(&self, state: &ResearchState) -> EngineResult<Reflection> {
        let user = reflection_user_prompt(state);

        match extract_structured::<Reflection>(
            self.model,
            REFLECTION_SYSTEM,
            &user,
            "identify_gap",
            "Identify the knowledge gap in the current summary.",
        )
        .await
        {
            Ok(reflection) if !reflection.knowledge_gap.trim().is_empty() => Ok(reflection),
            Ok(_) => Ok(default_reflection(state)),
            Err(ExtractError::Parse(e)) => {
                warn!(error = %e, "Reflection parse failure, using deterministic gap");
                Ok(default_reflection(state))
            }
            Err(ExtractError::Llm(e)) => Err(EngineError::LlmUnreachable(e)),
        }
    }
}

fn default_reflection(state: &ResearchState) -> Reflection {
    Reflection {
        knowledge_gap: format!(
            "Additional technical details, implementation specifics, and \
             recent developments regarding {}",
            state.topic,
        ),
        is_sufficient: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deepbrief_core::LlmError;
    use llm_client::ToolSpec;

    struct JsonModel {
        reply: String,
    }

    #[async_trait]
    impl ChatModel for JsonModel {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            Err(LlmError::EmptyResponse)
        }

        async fn complete_json(
            &self,
            _system: &str,
            _user: &str,
            _schema: &serde_json::Value,
        ) -> Result<String, LlmError> {
            Ok(self.reply.clone())
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
            "json"
        }
    }

    #[tokio::test]
    async fn parses_structured_reflection() {
        let model = JsonModel {
            reply: r#"{"knowledge_gap": "no benchmark data", "is_sufficient": false}"#.to_string(),
        };
        let state = ResearchState::new("topic");

        let reflection = Reflector::new(&model).reflect(&state).await.unwrap();
        assert_eq!(reflection.knowledge_gap, "no benchmark data");
        assert!(!reflection.is_sufficient);
    }

    #[tokio::test]
    async fn parse_failure_yields_deterministic_default() {
        let model = JsonModel {
            reply: "total garbage".to_string(),
        };
        let state = ResearchState::new("quantum error correction");

        let reflection = Reflector::new(&model).reflect(&state).await.unwrap();
        assert!(reflection.knowledge_gap.contains("quantum error correction"));
        assert!(!reflection.is_sufficient);
    }

    #[tokio::test]
    async fn empty_gap_also_falls_back() {
        let model = JsonModel {
            reply: r#"{"knowledge_gap": "  ", "is_sufficient": true}"#.to_string(),
        };
        let state = ResearchState::new("rust");

        let reflection = Reflector::new(&model).reflect(&state).await.unwrap();
        assert!(reflection.knowledge_gap.contains("rust"));
        // The sufficiency signal is discarded with the malformed gap
        assert!(!reflection.is_sufficient);
    }
}
