//! Shared value types for the Stepchain domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (e.g. the model is one of a closed set,
//! token counts are non-negative integers) and participate in domain
//! computations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

/// Number of tokens consumed or budgeted in an LLM API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenCount(u64);

impl TokenCount {
    /// Creates a [`TokenCount`] from a raw integer.
    pub fn new(count: u64) -> Self {
        Self(count)
    }

    /// Returns the underlying integer value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TokenCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Per-call and per-chain resource limits.
///
/// The defaults are the fixed production limits. Only `max_calls` is exposed
/// on the command line; tests construct smaller limits directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLimits {
    /// Maximum number of steps (and therefore service calls) per payload.
    pub max_calls: usize,
    /// A request estimated above this many input tokens cancels the chain.
    pub max_input_tokens: TokenCount,
    /// Output-token cap sent with every service call.
    pub max_output_tokens: TokenCount,
}

impl ChainLimits {
    /// Default call cap; overridable with `MAX_OPENAI_CALLS`.
    pub const DEFAULT_MAX_CALLS: usize = 5;
    /// Fixed input-token limit per request.
    pub const MAX_INPUT_TOKENS: u64 = 2000;
    /// Fixed output-token cap per request.
    pub const MAX_OUTPUT_TOKENS: u64 = 600;

    /// Returns the default limits with a different call cap.
    pub fn with_max_calls(max_calls: usize) -> Self {
        Self {
            max_calls,
            ..Self::default()
        }
    }
}

impl Default for ChainLimits {
    fn default() -> Self {
        Self {
            max_calls: Self::DEFAULT_MAX_CALLS,
            max_input_tokens: TokenCount::new(Self::MAX_INPUT_TOKENS),
            max_output_tokens: TokenCount::new(Self::MAX_OUTPUT_TOKENS),
        }
    }
}

// ---------------------------------------------------------------------------
// Model and response mode
// ---------------------------------------------------------------------------

/// The text-generation models a step may use.
///
/// Configuration values outside this set become [`Model::Gpt4oMini`] via
/// [`Model::sanitize`]; they are never an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Model {
    #[default]
    #[serde(rename = "gpt-4o-mini")]
    Gpt4oMini,
    #[serde(rename = "gpt-4o")]
    Gpt4o,
}

impl Model {
    /// Returns the wire name of the model.
    pub fn as_str(self) -> &'static str {
        match self {
            Model::Gpt4oMini => "gpt-4o-mini",
            Model::Gpt4o => "gpt-4o",
        }
    }

    /// Parses an exact wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "gpt-4o-mini" => Some(Model::Gpt4oMini),
            "gpt-4o" => Some(Model::Gpt4o),
            _ => None,
        }
    }

    /// Maps a model name onto an allowed model; unknown names become the default.
    pub fn sanitize_name(name: &str) -> Model {
        Model::from_name(name).unwrap_or_default()
    }

    /// Maps a step's `model` field onto an allowed model.
    ///
    /// An absent field takes `unset`; any present value (including `null`)
    /// that is not a supported name becomes the default model.
    pub fn sanitize(value: Option<&serde_json::Value>, unset: Model) -> Model {
        match value {
            None => unset,
            Some(value) => value
                .as_str()
                .map(Model::sanitize_name)
                .unwrap_or_default(),
        }
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------

/// How a step's returned text is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Ask the service for a JSON object and parse the reply.
    Json,
    /// Record the trimmed reply verbatim.
    Text,
}

impl ResponseFormat {
    /// `"text"` selects [`ResponseFormat::Text`]; every other value is `Json`.
    pub fn sanitize(value: Option<&serde_json::Value>) -> ResponseFormat {
        match value.and_then(serde_json::Value::as_str) {
            Some("text") => ResponseFormat::Text,
            _ => ResponseFormat::Json,
        }
    }
}

impl std::fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseFormat::Json => f.write_str("json"),
            ResponseFormat::Text => f.write_str("text"),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One message of a chat-style request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    /// Message text, sent verbatim.
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A fully assembled request to the text-generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: Model,
    /// Always `[system, user]` for chain steps.
    pub messages: Vec<ChatMessage>,
    /// Upper bound on generated tokens.
    pub max_output_tokens: TokenCount,
    /// Omitted from the wire request when `None`.
    pub temperature: Option<f64>,
    /// `Json` asks the service for a JSON object.
    pub response_format: ResponseFormat,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Milliseconds elapsed between `self` and now (zero if the clock moved back).
    pub fn elapsed_ms(self) -> u64 {
        (Utc::now() - self.0).num_milliseconds().max(0) as u64
    }
}
