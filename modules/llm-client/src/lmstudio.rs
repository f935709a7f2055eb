//! LM Studio chat client over the OpenAI-compatible `/chat/completions`
//! endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use deepbrief_core::LlmError;

use crate::traits::{ChatModel, ToolSpec};

// --- Wire types ---

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: WireFunction<'a>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ResponseToolCall>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    #[allow(dead_code)]
    name: String,
    /// OpenAI-compatible servers return arguments as a JSON-encoded string.
    arguments: String,
}

// --- Client ---

/// Chat client for a local LM Studio server.
pub struct LmStudio {
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl LmStudio {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            model: model.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %request.model, "LM Studio chat request");

        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::Http(Box::new(e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, message });
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::Http(Box::new(e)))
    }

    fn request<'a>(&'a self, system: &str, user: &str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: system.to_string(),
                },
                WireMessage {
                    role: "user",
                    content: user.to_string(),
                },
            ],
            temperature: 0.0,
            response_format: None,
            tools: None,
            tool_choice: None,
        }
    }

    fn first_message(response: ChatResponse) -> Result<ResponseMessage, LlmError> {
        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl ChatModel for LmStudio {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let request = self.request(system, user);
        let message = Self::first_message(self.chat(&request).await?)?;

        match message.content {
            Some(content) if !content.trim().is_empty() => Ok(content),
            _ => Err(LlmError::EmptyResponse),
        }
    }

    async fn complete_json(
        &self,
        system: &str,
        user: &str,
        schema: &serde_json::Value,
    ) -> Result<String, LlmError> {
        let mut request = self.request(system, user);
        request.response_format = Some(serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": "structured_response",
                "strict": true,
                "schema": schema,
            }
        }));

        let message = Self::first_message(self.chat(&request).await?)?;

        match message.content {
            Some(content) if !content.trim().is_empty() => Ok(content),
            _ => Err(LlmError::EmptyResponse),
        }
    }

    async fn call_tool(
        &self,
        system: &str,
        user: &str,
        tool: &ToolSpec,
    ) -> Result<serde_json::Value, LlmError> {
        let mut request = self.request(system, user);
        request.tools = Some(vec![WireTool {
            tool_type: "function",
            function: WireFunction {
                name: &tool.name,
                description: &tool.description,
                parameters: &tool.parameters,
            },
        }]);
        request.tool_choice = Some(serde_json::json!({
            "type": "function",
            "function": { "name": tool.name },
        }));

        let message = Self::first_message(self.chat(&request).await?)?;

        let call = message
            .tool_calls
            .into_iter()
            .next()
            .ok_or(LlmError::NoToolCall)?;

        serde_json::from_str(&call.function.arguments).map_err(|e| LlmError::Api {
            status: 200,
            message: format!("tool arguments were not valid JSON: {e}"),
        })
    }

    fn name(&self) -> &str {
        "lmstudio"
    }
}
