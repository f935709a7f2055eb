//! Ollama chat client over the native `/api/chat` endpoint.

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
struct WireOptions {
    temperature: f32,
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
    stream: bool,
    options: WireOptions,
    /// "json" for JSON mode, or a full JSON schema for constrained decoding.
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool<'a>>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
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
    arguments: serde_json::Value,
}

// --- Client ---

/// Chat client for a local Ollama server.
pub struct Ollama {
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl Ollama {
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
        let url = format!("{}/api/chat", self.base_url);

        debug!(model = %request.model, "Ollama chat request");

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
            stream: false,
            options: WireOptions { temperature: 0.0 },
            format: None,
            tools: None,
        }
    }
}

#[async_trait]
impl ChatModel for Ollama {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let request = self.request(system, user);
        let response = self.chat(&request).await?;

        if response.message.content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(response.message.content)
    }

    async fn complete_json(
        &self,
        system: &str,
        user: &str,
        schema: &serde_json::Value,
    ) -> Result<String, LlmError> {
        let mut request = self.request(system, user);
        // Ollama accepts a schema in `format` for constrained decoding;
        // servers too old for that still honor the bare "json" string.
        request.format = Some(if schema.is_object() {
            schema.clone()
        } else {
            serde_json::Value::String("json".to_string())
        });

        let response = self.chat(&request).await?;

        if response.message.content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(response.message.content)
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

        let response = self.chat(&request).await?;

        response
            .message
            .tool_calls
            .into_iter()
            .next()
            .map(|c| c.function.arguments)
            .ok_or(LlmError::NoToolCall)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
