//! The chain executor: turns one payload into a [`ChainRun`] and a
//! [`MergedResult`].
//!
//! Steps run strictly in configured order, capped at
//! [`ChainLimits::max_calls`]. Before each call the assembled request is
//! measured by the [`TokenEstimator`]; a request over
//! [`ChainLimits::max_input_tokens`] cancels the rest of the chain without
//! being sent.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};

use pipeline::prompt::{assemble_prompt, dependency_block, incoming_block};
use pipeline::{
    invalid_json_output, resolve_output_names, CancellationDetail, ChainLimits, ChainRun,
    ChatMessage, CompletionRequest, LlmProvider, MergedResult, ResponseFormat, StepDefinitionSet,
    StepSpec, StepchainError, TokenEstimator,
};

const MAX_LOG_CHARS: usize = 2_000;

/// Executes step chains against a fixed step definition set.
pub struct ChainExecutor {
    steps: StepDefinitionSet,
    limits: ChainLimits,
    provider: Arc<dyn LlmProvider>,
    estimator: Arc<dyn TokenEstimator>,
}

impl ChainExecutor {
    pub fn new(
        steps: StepDefinitionSet,
        limits: ChainLimits,
        provider: Arc<dyn LlmProvider>,
        estimator: Arc<dyn TokenEstimator>,
    ) -> Self {
        if steps.len() > limits.max_calls {
            warn!(
                configured = steps.len(),
                max_calls = limits.max_calls,
                "steps beyond the call cap will never run"
            );
        }
        Self {
            steps,
            limits,
            provider,
            estimator,
        }
    }

    pub fn limits(&self) -> ChainLimits {
        self.limits
    }

    /// The prefix of the step list that runs for every payload.
    pub fn steps_to_run(&self) -> &[StepSpec] {
        let steps = self.steps.steps();
        &steps[..steps.len().min(self.limits.max_calls)]
    }

    /// Runs the chain for `payload` and merges the configured outputs.
    pub async fn process(&self, payload: Value) -> Result<MergedResult, StepchainError> {
        let run = self.execute(payload).await?;
        let output_names = resolve_output_names(self.steps.output_agents(), self.steps_to_run());
        Ok(run.into_result(&output_names))
    }

    /// Runs the chain for `payload` and returns the raw run state.
    ///
    /// Service failures abort the run and are returned as
    /// [`StepchainError::Provider`]. Guardrail cancellations and unparseable
    /// model output are recorded in the run instead.
    pub async fn execute(&self, payload: Value) -> Result<ChainRun, StepchainError> {
        if self.steps.is_empty() {
            return Err(StepchainError::NoStepsConfigured);
        }

        let mut run = ChainRun::new(payload);
        let span = info_span!("chain", run_id = %run.id);
        async {
            for (index, step) in self.steps_to_run().iter().enumerate() {
                let request = self.build_request(step, &run);

                let input_tokens = self.estimator.estimate(&request.messages, request.model);
                if input_tokens > self.limits.max_input_tokens {
                    warn!(
                        step = %step.name,
                        limit = %self.limits.max_input_tokens,
                        actual = %input_tokens,
                        "input token guardrail tripped; cancelling chain"
                    );
                    run.cancel(CancellationDetail::max_input_tokens_exceeded(
                        step.name.clone(),
                        self.limits.max_input_tokens,
                        input_tokens,
                    ));
                    break;
                }

                info!(
                    index = index + 1,
                    step = %step.name,
                    model = %request.model,
                    format = %request.response_format,
                    input_tokens = %input_tokens,
                    "running step"
                );
                debug!(prompt = %truncate_for_log(&request.messages[1].content), "step prompt");

                let text = self
                    .provider
                    .complete(&request)
                    .await
                    .map_err(|source| StepchainError::Provider {
                        step: step.name.clone(),
                        source,
                    })?;

                let output = record_output(text.trim(), step.response_format);
                debug!(
                    step = %step.name,
                    output = %truncate_for_log(&output.to_string()),
                    "step output"
                );
                run.record(step.name.clone(), output);
            }

            info!(
                steps_recorded = run.outputs().len(),
                cancelled = run.is_cancelled(),
                elapsed_ms = run.started_at.elapsed_ms(),
                "chain finished"
            );
            Ok::<_, StepchainError>(run)
        }
        .instrument(span)
        .await
    }

    /// Builds the `[system, user]` request for `step` given the run so far.
    pub fn build_request(&self, step: &StepSpec, run: &ChainRun) -> CompletionRequest {
        let incoming = incoming_block(&step.include_incoming, run.payload());
        let dependencies = dependency_block(&step.dependencies, run.outputs());
        let user_prompt = assemble_prompt(
            &step.prompt_intro,
            &incoming,
            &dependencies,
            &step.prompt_ending,
        );

        CompletionRequest {
            model: step.model,
            messages: vec![
                ChatMessage::system(step.system_prompt.as_str()),
                ChatMessage::user(user_prompt),
            ],
            max_output_tokens: self.limits.max_output_tokens,
            temperature: step.temperature,
            response_format: step.response_format,
        }
    }
}

/// Converts trimmed service text into the value recorded for a step.
fn record_output(text: &str, format: ResponseFormat) -> Value {
    match format {
        ResponseFormat::Text => Value::String(text.to_owned()),
        ResponseFormat::Json => {
            serde_json::from_str(text).unwrap_or_else(|_| invalid_json_output(text))
        }
    }
}

fn truncate_for_log(input: &str) -> String {
    let char_count = input.chars().count();
    if char_count <= MAX_LOG_CHARS {
        return input.to_owned();
    }
    let mut preview: String = input.chars().take(MAX_LOG_CHARS).collect();
    preview.push_str(&format!("... [truncated, total_chars={char_count}]"));
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_output_parses_any_json_value() {
        assert_eq!(record_output("{\"y\":2}", ResponseFormat::Json), json!({"y": 2}));
        assert_eq!(record_output("[1]", ResponseFormat::Json), json!([1]));
    }

    #[test]
    fn unparseable_json_output_is_recorded_not_raised() {
        assert_eq!(
            record_output("Sure! {oops", ResponseFormat::Json),
            json!({"error": "invalid_json_from_model", "raw_text": "Sure! {oops"})
        );
        assert_eq!(
            record_output("", ResponseFormat::Json),
            json!({"error": "invalid_json_from_model", "raw_text": ""})
        );
    }

    #[test]
    fn text_output_is_verbatim() {
        assert_eq!(
            record_output("{\"y\": 2}", ResponseFormat::Text),
            json!("{\"y\": 2}")
        );
    }

    #[test]
    fn long_log_values_are_truncated() {
        let long = "x".repeat(MAX_LOG_CHARS + 5);
        let preview = truncate_for_log(&long);
        assert!(preview.ends_with("[truncated, total_chars=2005]"));
        assert_eq!(truncate_for_log("short"), "short");
    }
}
