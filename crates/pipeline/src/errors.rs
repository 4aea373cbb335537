//! Top-level error types for the Stepchain domain.
//!
//! [`StepchainError`] covers conditions that stop the agent from starting or
//! drop the result of one payload. Guardrail cancellations and malformed model
//! output are *not* errors: they are recorded as data in the chain's outputs.
//!
//! [`ProviderError`] is the failure type of the text-generation port. Failed
//! calls are never retried.

use thiserror::Error;

use crate::StepName;

// ---------------------------------------------------------------------------
// Provider errors
// ---------------------------------------------------------------------------

/// Failure reported by a [`crate::LlmProvider`] implementation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request never produced an HTTP response (connect failure, timeout).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        /// `true` when the failure was a client-side timeout.
        timed_out: bool,
    },

    /// The service answered with a non-success status.
    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded or lacked a completion.
    #[error("malformed service response: {message}")]
    MalformedResponse { message: String },
}

// ---------------------------------------------------------------------------
// Agent-level errors
// ---------------------------------------------------------------------------

/// Errors that stop the agent at startup or drop one payload's result.
#[derive(Debug, Error)]
pub enum StepchainError {
    /// The step configuration is structurally invalid.
    ///
    /// Produced at load time; the agent never reaches the serving state.
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Description of the configuration problem.
        message: String,
    },

    /// A payload arrived but the step list is empty.
    #[error("No steps loaded. Provide a valid steps configuration.")]
    NoStepsConfigured,

    /// The text-generation call for a step failed.
    ///
    /// Propagates out of the per-payload unit; the payload's result is dropped.
    #[error("Step '{step}' failed: {source}")]
    Provider {
        /// The step whose call failed.
        step: StepName,
        #[source]
        source: ProviderError,
    },
}

impl StepchainError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        StepchainError::ConfigurationError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_failures_carry_code_and_body() {
        let err = ProviderError::Status {
            status: 429,
            body: "slow down".into(),
        };
        assert_eq!(err.to_string(), "service returned HTTP 429: slow down");
    }

    #[test]
    fn provider_failures_name_the_step() {
        let err = StepchainError::Provider {
            step: StepName::new("summarise").unwrap(),
            source: ProviderError::Transport {
                message: "connection refused".into(),
                timed_out: false,
            },
        };
        assert_eq!(
            err.to_string(),
            "Step 'summarise' failed: transport error: connection refused"
        );
    }
}
