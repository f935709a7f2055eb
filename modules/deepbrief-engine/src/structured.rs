//! Structured-response extraction with an ordered fallback chain.
//!
//! Local models are unreliable at machine-parseable output, so every
//! structured call walks up to three strategies, short-circuiting on the
//! first success:
//!
//! 1. JSON-mode completion, constrained to the target schema.
//! 2. A forced tool call whose input schema is the target schema.
//! 3. Labeled-line extraction over a plain completion.
//!
//! Transport failures abort the chain — no invocation mode can route around
//! a dead server. Everything else falls through; exhaustion yields
//! [`ParseFailure`] and the caller substitutes its safe default.

use tracing::{debug, warn};

use deepbrief_core::{LlmError, ParseFailure};
use llm_client::util::{extract_json_object, strip_thinking_tokens};
use llm_client::{ChatModel, StructuredOutput, ToolSpec};

/// Why a structured extraction produced no value.
#[derive(Debug)]
pub enum ExtractError {
    /// Every strategy failed to parse; recoverable via the caller's default.
    Parse(ParseFailure),
    /// The model transport failed; fatal to the run.
    Llm(LlmError),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "{e}"),
            Self::Llm(e) => write!(f, "{e}"),
        }
    }
}

/// Run the full strategy chain for a `T`-shaped response.
pub async fn extract_structured<T: StructuredOutput>(
    model: &dyn ChatModel,
    system: &str,
    user: &str,
    tool_name: &str,
    tool_description: &str,
) -> Result<T, ExtractError> {
    let schema = T::strict_schema();
    let mut failures: Vec<String> = Vec::new();

    // Strategy 1: JSON mode
    let json_system = format!("{system}\n\n{}", json_instruction::<T>());
    match model.complete_json(&json_system, user, &schema).await {
        Ok(text) => match parse_json_text::<T>(&text) {
            Ok(value) => return Ok(value),
            Err(e) => {
                debug!(strategy = "json_mode", error = %e, "Structured parse failed");
                failures.push(format!("json_mode: {e}"));
            }
        },
        Err(LlmError::Http(e)) => return Err(ExtractError::Llm(LlmError::Http(e))),
        Err(e) => {
            debug!(strategy = "json_mode", error = %e, "JSON-mode call failed");
            failures.push(format!("json_mode: {e}"));
        }
    }

    // Strategy 2: forced tool call
    let tool = ToolSpec::new(tool_name, tool_description, schema.clone());
    match model.call_tool(system, user, &tool).await {
        Ok(args) => match serde_json::from_value::<T>(args) {
            Ok(value) => return Ok(value),
            Err(e) => {
                debug!(strategy = "tool_call", error = %e, "Tool arguments did not match schema");
                failures.push(format!("tool_call: {e}"));
            }
        },
        Err(LlmError::Http(e)) => return Err(ExtractError::Llm(LlmError::Http(e))),
        Err(e) => {
            debug!(strategy = "tool_call", error = %e, "Tool call failed");
            failures.push(format!("tool_call: {e}"));
        }
    }

    // Strategy 3: labeled lines over a plain completion
    let labeled_system = format!("{system}\n\n{}", labeled_instruction::<T>());
    match model.complete(&labeled_system, user).await {
        Ok(text) => match labeled_line_extract::<T>(&text) {
            Ok(value) => return Ok(value),
            Err(e) => failures.push(format!("labeled_lines: {e}")),
        },
        // A server that answers nothing in plain mode is unreachable for
        // practical purposes; no strategy is left to absorb it.
        Err(LlmError::Http(e)) => return Err(ExtractError::Llm(LlmError::Http(e))),
        Err(LlmError::Api { status, message }) => {
            return Err(ExtractError::Llm(LlmError::Api { status, message }))
        }
        Err(e) => failures.push(format!("plain: {e}")),
    }

    warn!(
        type_name = %T::type_name(),
        attempts = failures.len(),
        "Structured extraction exhausted all strategies"
    );
    Err(ExtractError::Parse(ParseFailure::new(failures.join("; "))))
}

fn json_instruction<T: StructuredOutput>() -> String {
    format!(
        "Respond with a single JSON object with exactly these keys: {}. \
         No text before or after the JSON object.",
        T::property_names().join(", "),
    )
}

fn labeled_instruction<T: StructuredOutput>() -> String {
    format!(
        "Respond with one line per field, formatted as `name: value`, for \
         these fields: {}.",
        T::property_names().join(", "),
    )
}

fn parse_json_text<T: StructuredOutput>(text: &str) -> Result<T, ParseFailure> {
    let cleaned = strip_thinking_tokens(text);
    let object = extract_json_object(&cleaned)
        .ok_or_else(|| ParseFailure::new("no JSON object in response"))?;
    serde_json::from_str(object).map_err(|e| ParseFailure::new(e.to_string()))
}

/// Last-resort extraction: scan lines for `field: value` pairs named after
/// the schema's properties, coercing values by the schema's declared types.
fn labeled_line_extract<T: StructuredOutput>(text: &str) -> Result<T, ParseFailure> {
    let schema = T::strict_schema();
    let props = T::property_names();
    if props.is_empty() {
        return Err(ParseFailure::new("schema has no named properties"));
    }

    let cleaned = strip_thinking_tokens(text);
    let mut map = serde_json::Map::new();

    for line in cleaned.lines() {
        let line = line.trim().trim_start_matches(['-', '*']).trim();
        for prop in &props {
            if map.contains_key(prop) {
                continue;
            }
            let Some(raw) = match_label(line, prop) else {
                continue;
            };
            let value = coerce(raw, property_type(&schema, prop));
            map.insert(prop.clone(), value);
        }
    }

    let missing: Vec<&String> = props.iter().filter(|p| !map.contains_key(*p)).collect();
    if !missing.is_empty() {
        return Err(ParseFailure::new(format!(
            "labeled-line extraction missing fields: {missing:?}"
        )));
    }

    serde_json::from_value(serde_json::Value::Object(map))
        .map_err(|e| ParseFailure::new(e.to_string()))
}

/// Match `prop: value` at the start of a line, case-insensitively, tolerating
/// quotes, markdown bold, and spaces in place of underscores.
fn match_label<'a>(line: &'a str, prop: &str) -> Option<&'a str> {
    let lowered = line.to_lowercase();
    let spaced = prop.replace('_', " ");

    for label in [prop, spaced.as_str()] {
        for decorated in [
            format!("{label}:"),
            format!("\"{label}\":"),
            format!("**{label}**:"),
        ] {
            if lowered.starts_with(&decorated) {
                let rest = &line[decorated.len()..];
                return Some(
                    rest.trim()
                        .trim_matches(|c| c == '"' || c == ',')
                        .trim(),
                );
            }
        }
    }
    None
}

fn property_type<'a>(schema: &'a serde_json::Value, prop: &str) -> Option<&'a str> {
    schema
        .get("properties")
        .and_then(|p| p.get(prop))
        .and_then(|p| p.get("type"))
        .and_then(|t| t.as_str())
}

fn coerce(raw: &str, type_name: Option<&str>) -> serde_json::Value {
    match type_name {
        Some("boolean") => {
            let truthy = matches!(raw.to_lowercase().as_str(), "true" | "yes" | "y" | "1");
            serde_json::Value::Bool(truthy)
        }
        Some("number") => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some("integer") => raw
            .parse::<i64>()
            .map(|n| serde_json::Value::Number(n.into()))
            .unwrap_or(serde_json::Value::Null),
        _ => serde_json::Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use std::sync::Mutex;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Reflection {
        knowledge_gap: String,
        is_sufficient: bool,
    }

    /// Scripted model: each invocation mode has a fixed reply.
    struct ScriptedModel {
        json_reply: Option<Result<String, ()>>,
        tool_reply: Option<serde_json::Value>,
        plain_reply: Option<String>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedModel {
        fn new() -> Self {
            Self {
                json_reply: None,
                tool_reply: None,
                plain_reply: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push("plain");
            match &self.plain_reply {
                Some(text) => Ok(text.clone()),
                None => Err(LlmError::EmptyResponse),
            }
        }

        async fn complete_json(
            &self,
            _system: &str,
            _user: &str,
            _schema: &serde_json::Value,
        ) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push("json");
            match &self.json_reply {
                Some(Ok(text)) => Ok(text.clone()),
                Some(Err(())) => Err(LlmError::Api {
                    status: 400,
                    message: "format not supported".into(),
                }),
                None => Err(LlmError::EmptyResponse),
            }
        }

        async fn call_tool(
            &self,
            _system: &str,
            _user: &str,
            _tool: &ToolSpec,
        ) -> Result<serde_json::Value, LlmError> {
            self.calls.lock().unwrap().push("tool");
            match &self.tool_reply {
                Some(args) => Ok(args.clone()),
                None => Err(LlmError::NoToolCall),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn json_mode_success_short_circuits() {
        let mut model = ScriptedModel::new();
        model.json_reply = Some(Ok(
            r#"{"knowledge_gap": "needs benchmarks", "is_sufficient": false}"#.to_string(),
        ));

        let parsed: Reflection = extract_structured(&model, "sys", "user", "reflect", "d")
            .await
            .unwrap();
        assert_eq!(parsed.knowledge_gap, "needs benchmarks");
        assert_eq!(model.calls(), vec!["json"]);
    }

    #[tokio::test]
    async fn json_mode_tolerates_thinking_tokens_and_prose() {
        let mut model = ScriptedModel::new();
        model.json_reply = Some(Ok(
            "<think>hmm</think>Here you go: {\"knowledge_gap\": \"gap\", \"is_sufficient\": true}"
                .to_string(),
        ));

        let parsed: Reflection = extract_structured(&model, "sys", "user", "reflect", "d")
            .await
            .unwrap();
        assert!(parsed.is_sufficient);
    }

    #[tokio::test]
    async fn falls_back_to_tool_call_on_json_failure() {
        let mut model = ScriptedModel::new();
        model.json_reply = Some(Err(()));
        model.tool_reply = Some(serde_json::json!({
            "knowledge_gap": "via tool",
            "is_sufficient": false,
        }));

        let parsed: Reflection = extract_structured(&model, "sys", "user", "reflect", "d")
            .await
            .unwrap();
        assert_eq!(parsed.knowledge_gap, "via tool");
        assert_eq!(model.calls(), vec!["json", "tool"]);
    }

    #[tokio::test]
    async fn falls_back_to_labeled_lines_as_last_resort() {
        let mut model = ScriptedModel::new();
        model.json_reply = Some(Ok("not json at all".to_string()));
        model.plain_reply = Some(
            "knowledge_gap: missing performance data\nis_sufficient: no".to_string(),
        );

        let parsed: Reflection = extract_structured(&model, "sys", "user", "reflect", "d")
            .await
            .unwrap();
        assert_eq!(parsed.knowledge_gap, "missing performance data");
        assert!(!parsed.is_sufficient);
        assert_eq!(model.calls(), vec!["json", "tool", "plain"]);
    }

    #[tokio::test]
    async fn exhausted_chain_is_parse_failure() {
        let model = ScriptedModel::new();
        let result: Result<Reflection, _> =
            extract_structured(&model, "sys", "user", "reflect", "d").await;
        assert!(matches!(result, Err(ExtractError::Parse(_))));
    }

    #[test]
    fn labeled_lines_handle_decoration_and_spaced_names() {
        let text = "- **Knowledge gap**: \"decoder details\"\n* is_sufficient: TRUE";
        let parsed: Reflection = labeled_line_extract(text).unwrap();
        assert_eq!(parsed.knowledge_gap, "decoder details");
        assert!(parsed.is_sufficient);
    }

    #[test]
    fn labeled_lines_missing_field_fails() {
        let text = "knowledge_gap: something";
        assert!(labeled_line_extract::<Reflection>(text).is_err());
    }

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Scored {
        score: f32,
    }

    #[test]
    fn labeled_lines_coerce_numbers() {
        let parsed: Scored = labeled_line_extract("score: 0.75").unwrap();
        assert!((parsed.score - 0.75).abs() < f32::EPSILON);
    }
}
