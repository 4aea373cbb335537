//! Stepchain orchestration: the inbound buffer, the chain executor, and the
//! polling agent loop that connects them.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** The executor sequences calls between the domain
//! logic in the [`pipeline`] crate (prompt assembly, merging) and the port
//! traits ([`pipeline::LlmProvider`], [`pipeline::TokenEstimator`]). It
//! contains no transport or provider details of its own.
//!
//! ## Concurrency
//!
//! One producer path enqueues into [`InboundBuffer`]; one [`Agent`] drains it.
//! Exactly one chain is in flight at a time and steps within a chain run
//! strictly in order.

pub mod agent;
pub mod buffer;
pub mod executor;

pub use agent::{Agent, AgentStats, DEFAULT_POLL_INTERVAL};
pub use buffer::InboundBuffer;
pub use executor::ChainExecutor;
