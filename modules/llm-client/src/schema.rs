use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

/// Trait for types that can be requested as structured model output.
///
/// Automatically implemented for any `JsonSchema + DeserializeOwned` type.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Generate a strict JSON schema for this type.
    ///
    /// Local runtimes that constrain decoding to a schema (Ollama `format`,
    /// LM Studio `response_format`) want:
    /// 1. `additionalProperties: false` on every object
    /// 2. every property listed in `required`, nullable ones included
    /// 3. no `$ref` indirection — definitions fully inlined
    fn strict_schema() -> serde_json::Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        let definitions = value.get("definitions").cloned();
        tighten(&mut value, definitions.as_ref());

        if let serde_json::Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
        }

        value
    }

    /// Property names of the top-level object, used by the labeled-line
    /// fallback parser.
    fn property_names() -> Vec<String> {
        let schema = Self::strict_schema();
        schema
            .get("properties")
            .and_then(|p| p.as_object())
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

/// Recursively strictify object schemas and inline `#/definitions/` refs.
fn tighten(value: &mut serde_json::Value, definitions: Option<&serde_json::Value>) {
    match value {
        serde_json::Value::Object(map) => {
            // Inline a $ref before touching anything else
            if let Some(serde_json::Value::String(ref_path)) = map.get("$ref").cloned() {
                if let Some(defs) = definitions {
                    if let Some(name) = ref_path.strip_prefix("#/definitions/") {
                        if let Some(def) = defs.get(name) {
                            *value = def.clone();
                            tighten(value, definitions);
                            return;
                        }
                    }
                }
            }

            // schemars wraps single-variant refs in allOf
            if let Some(serde_json::Value::Array(all_of)) = map.get("allOf").cloned() {
                if all_of.len() == 1 {
                    *value = all_of.into_iter().next().expect("len checked");
                    tighten(value, definitions);
                    return;
                }
            }

            if map.get("type") == Some(&serde_json::Value::String("object".to_string())) {
                map.insert(
                    "additionalProperties".to_string(),
                    serde_json::Value::Bool(false),
                );
                if let Some(serde_json::Value::Object(props)) = map.get("properties") {
                    let all_keys: Vec<serde_json::Value> = props
                        .keys()
                        .map(|k| serde_json::Value::String(k.clone()))
                        .collect();
                    map.insert("required".to_string(), serde_json::Value::Array(all_keys));
                }
            }

            for (_, v) in map.iter_mut() {
                tighten(v, definitions);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                tighten(item, definitions);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct Reflection {
        knowledge_gap: String,
        is_sufficient: bool,
    }

    #[derive(Deserialize, JsonSchema)]
    struct Scored {
        url: String,
        relevance_score: f32,
        reason: Option<String>,
    }

    #[derive(Deserialize, JsonSchema)]
    struct Batch {
        sources: Vec<Scored>,
    }

    #[test]
    fn schema_is_object() {
        let schema = Reflection::strict_schema();
        assert!(schema.is_object());
        assert!(!schema.as_object().unwrap().contains_key("$schema"));
    }

    #[test]
    fn all_properties_required_even_nullable() {
        let schema = Scored::strict_schema();
        let required = schema["required"].as_array().unwrap();
        let names: Vec<&str> = required.iter().filter_map(|v| v.as_str()).collect();
        assert!(names.contains(&"url"));
        assert!(names.contains(&"relevance_score"));
        assert!(names.contains(&"reason"));
    }

    #[test]
    fn nested_definitions_inlined() {
        let schema = Batch::strict_schema();
        let obj = schema.as_object().unwrap();
        assert!(!obj.contains_key("definitions"));

        let items = &schema["properties"]["sources"]["items"];
        assert!(items.get("$ref").is_none());
        assert_eq!(items["type"], "object");
        assert_eq!(items["additionalProperties"], false);
    }

    #[test]
    fn property_names_match_fields() {
        let mut names = Reflection::property_names();
        names.sort();
        assert_eq!(names, vec!["is_sufficient", "knowledge_gap"]);
    }
}
