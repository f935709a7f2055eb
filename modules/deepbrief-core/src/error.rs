//! Typed errors for search, LLM, and engine operations.

use thiserror::Error;

/// Errors from a single search provider call.
///
/// Never fatal: the gateway degrades any of these to zero results for the
/// failing provider and proceeds with whatever the others returned.
#[derive(Debug, Error)]
pub enum SearchError {
    /// HTTP transport failed
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Provider answered with a non-success status
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not match the provider's wire shape
    #[error("failed to decode provider response: {0}")]
    Decode(String),

    /// Provider exceeded its per-call timeout
    #[error("provider timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

/// Errors from a language-model call.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport failed
    #[error("LLM HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Model server answered with a non-success status
    #[error("LLM API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Model produced no usable text
    #[error("LLM returned an empty response")]
    EmptyResponse,

    /// Tool-calling mode was requested but the model made no tool call
    #[error("LLM made no tool call")]
    NoToolCall,
}

/// Structured-output mismatch after the full fallback chain.
///
/// Recoverable by contract: every caller substitutes its documented safe
/// default instead of propagating this to the run level.
#[derive(Debug, Error)]
#[error("structured response parse failure: {reason}")]
pub struct ParseFailure {
    pub reason: String,
}

impl ParseFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Run-fatal conditions, surfaced to the caller with a readable reason.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Options rejected at the engine boundary
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The language model could not be reached at all — no safe default exists
    #[error("language model unreachable: {0}")]
    LlmUnreachable(#[source] LlmError),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
