//! Local input-token counting for the guardrail.
//!
//! Follows the chat-format accounting used by OpenAI models: a fixed overhead
//! per message, the encoded role and content, and a fixed priming cost for the
//! reply. Text is encoded with the `o200k_base` vocabulary shared by every
//! supported model.

use tiktoken_rs::CoreBPE;

use pipeline::{ChatMessage, Model, Role, TokenCount, TokenEstimator};

use crate::LlmError;

const REPLY_PRIMING_TOKENS: u64 = 3;

/// BPE-backed estimator. Pure once constructed.
pub struct TiktokenEstimator {
    encoder: CoreBPE,
}

impl TiktokenEstimator {
    /// Loads the bundled `o200k_base` vocabulary.
    pub fn new() -> Result<Self, LlmError> {
        let encoder =
            tiktoken_rs::o200k_base().map_err(|e| LlmError::Tokenizer(e.to_string()))?;
        Ok(Self { encoder })
    }

    fn tokens_per_message(model: Model) -> u64 {
        match model {
            Model::Gpt4oMini | Model::Gpt4o => 3,
        }
    }

    fn text_tokens(&self, text: &str) -> u64 {
        self.encoder.encode_with_special_tokens(text).len() as u64
    }

    fn role_name(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

impl std::fmt::Debug for TiktokenEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiktokenEstimator")
            .field("encoding", &"o200k_base")
            .finish()
    }
}

impl TokenEstimator for TiktokenEstimator {
    fn estimate(&self, messages: &[ChatMessage], model: Model) -> TokenCount {
        let per_message = Self::tokens_per_message(model);
        let body: u64 = messages
            .iter()
            .map(|message| {
                per_message
                    + self.text_tokens(Self::role_name(message.role))
                    + self.text_tokens(&message.content)
            })
            .sum();
        TokenCount::new(body + REPLY_PRIMING_TOKENS)
    }
}
