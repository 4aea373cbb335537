//! Stepchain LLM provider infrastructure adapter.
//!
//! Implements the [`pipeline::LlmProvider`] trait for OpenAI-compatible
//! chat-completions APIs, and the [`pipeline::TokenEstimator`] trait used by the
//! input-token guardrail.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport, request formatting, response
//! parsing, and status classification live here. The [`pipeline`] crate sees
//! only [`pipeline::LlmProvider`] and [`pipeline::TokenEstimator`].

use thiserror::Error;

pub mod openai;
pub mod tokens;

pub use openai::{OpenAiConfig, OpenAiProvider};
pub use tokens::TiktokenEstimator;

/// Errors raised while constructing a provider or the token estimator.
///
/// Per-call failures are reported as [`pipeline::ProviderError`].
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("OPENAI_API_KEY is missing in the environment")]
    MissingCredential,
    #[error("API key is not a valid header value: {0}")]
    InvalidCredential(String),
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
    #[error("failed to load tokenizer: {0}")]
    Tokenizer(String),
}
