//! Stepchain message boundary.
//!
//! Connects the agent to a relay server speaking newline-delimited JSON:
//!
//! - [`InboundEnvelope`] validates inbound messages; only `content` is kept.
//! - [`finalize_outbound`] turns a result into a signed JSON object.
//! - [`RelayTransport`] owns the TCP connection and moves messages between
//!   the socket, a [`pipeline::InboundSink`], and the outbound result channel.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** The [`pipeline`] crate sees only
//! [`pipeline::InboundSink`] and [`pipeline::MergedResult`].

pub mod envelope;
pub mod transport;

pub use envelope::{finalize_outbound, InboundEnvelope};
pub use transport::{RelayConfig, RelayTransport};

/// Failures of the relay connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("relay I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("relay closed the connection")]
    Closed,
}
