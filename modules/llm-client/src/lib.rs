//! Provider-agnostic chat client for local LLM runtimes.
//!
//! Two backends speak the [`ChatModel`] capability: [`Ollama`] over its
//! native `/api/chat` endpoint and [`LmStudio`] over the OpenAI-compatible
//! `/v1/chat/completions` endpoint. Both support a plain completion, a
//! JSON-constrained completion, and a forced single tool call — the three
//! invocation modes the structured-output fallback chain walks through.

pub mod lmstudio;
pub mod ollama;
pub mod schema;
pub mod traits;
pub mod util;

pub use lmstudio::LmStudio;
pub use ollama::Ollama;
pub use schema::StructuredOutput;
pub use traits::{ChatModel, ToolSpec};
