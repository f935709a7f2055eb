use async_trait::async_trait;
use deepbrief_core::LlmError;

/// A single tool the model is forced to call, carrying the target type's
/// JSON schema as its parameter definition.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Chat capability over a local LLM runtime.
///
/// All calls are synchronous with respect to the research loop: the engine
/// never advances state until a call completes or its fallback chain is
/// exhausted.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Plain text completion.
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;

    /// JSON-mode completion. The runtime constrains output to valid JSON;
    /// where supported, `schema` constrains it further to the target shape.
    async fn complete_json(
        &self,
        system: &str,
        user: &str,
        schema: &serde_json::Value,
    ) -> Result<String, LlmError>;

    /// Forced tool call. Returns the arguments the model passed to the tool.
    async fn call_tool(
        &self,
        system: &str,
        user: &str,
        tool: &ToolSpec,
    ) -> Result<serde_json::Value, LlmError>;

    fn name(&self) -> &str;
}
