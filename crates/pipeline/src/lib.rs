//! Core domain for Stepchain.
//!
//! This crate contains every domain concept used by the chain engine: step
//! definitions, prompt assembly, per-payload run state, output merging, and
//! the port traits that infrastructure crates implement.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`StepName`, `AgentId`, `ChainRunId`) |
//! | [`types`] | Shared value types (`TokenCount`, `Model`, `CompletionRequest`, etc.) |
//! | [`errors`] | Agent-level and provider errors |
//! | [`steps`] | Step definition set loading |
//! | [`prompt`] | Block rendering and prompt assembly |
//! | [`run`] | `ChainRun`, cancellation detail, `MergedResult` |
//! | [`merge`] | First-wins output merging |
//! | [`ports`] | `LlmProvider`, `TokenEstimator`, and `InboundSink` traits |

pub mod errors;
pub mod identifiers;
pub mod merge;
pub mod ports;
pub mod prompt;
pub mod run;
pub mod steps;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{ProviderError, StepchainError};
pub use identifiers::{AgentId, ChainRunId, StepName};
pub use merge::{merge_outputs, resolve_output_names};
pub use ports::{InboundSink, LlmProvider, TokenEstimator};
pub use run::{invalid_json_output, CancellationDetail, ChainRun, MergedResult};
pub use steps::{IncomingSelector, StepDefinitionSet, StepSpec, DEFAULT_SYSTEM_PROMPT};
pub use types::{
    ChainLimits, ChatMessage, CompletionRequest, Model, ResponseFormat, Role, Timestamp,
    TokenCount,
};
