//! Port traits implemented outside this crate.
//!
//! The chain executor depends only on [`LlmProvider`] and [`TokenEstimator`];
//! the `llm` crate supplies the production implementations and tests supply
//! scripted ones. [`InboundSink`] lets the transport hand payloads to the
//! agent's buffer without depending on the orchestration crate.

use async_trait::async_trait;
use serde_json::Value;

use crate::{ChatMessage, CompletionRequest, Model, ProviderError, TokenCount};

/// The external text-generation service: request in, text out.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Performs one completion call and returns the raw (untrimmed) text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}

/// Estimates the input size of a request before it is sent.
///
/// Must be a pure function of its arguments.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, messages: &[ChatMessage], model: Model) -> TokenCount;
}

/// Destination for inbound payloads. Must never block or fail.
pub trait InboundSink: Send + Sync {
    fn enqueue(&self, payload: Value);
}
