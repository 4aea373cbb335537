//! Per-payload chain state and the result emitted for it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::merge::merge_outputs;
use crate::{ChainRunId, StepName, Timestamp, TokenCount};

/// Error tag recorded when the input-token guardrail cancels a chain.
pub const MAX_INPUT_TOKENS_EXCEEDED: &str = "max_input_tokens_exceeded";

/// Error tag recorded when a JSON-mode step returns unparseable text.
pub const INVALID_JSON_FROM_MODEL: &str = "invalid_json_from_model";

/// Why a chain stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationDetail {
    pub error: String,
    /// The step whose request exceeded the limit. It was never sent.
    pub step: StepName,
    pub max_input_tokens: TokenCount,
    pub actual_input_tokens: TokenCount,
}

impl CancellationDetail {
    pub fn max_input_tokens_exceeded(step: StepName, limit: TokenCount, actual: TokenCount) -> Self {
        Self {
            error: MAX_INPUT_TOKENS_EXCEEDED.to_owned(),
            step,
            max_input_tokens: limit,
            actual_input_tokens: actual,
        }
    }

    /// The detail as a JSON object, as recorded in the step's output slot.
    pub fn to_value(&self) -> Value {
        json!({
            "error": self.error,
            "step": self.step.as_str(),
            "max_input_tokens": self.max_input_tokens.as_u64(),
            "actual_input_tokens": self.actual_input_tokens.as_u64(),
        })
    }
}

/// Output recorded for a JSON-mode step whose reply did not parse.
pub fn invalid_json_output(raw_text: &str) -> Value {
    json!({
        "error": INVALID_JSON_FROM_MODEL,
        "raw_text": raw_text,
    })
}

/// State of one chain execution. Owned by the executor for its whole life.
#[derive(Debug, Clone)]
pub struct ChainRun {
    pub id: ChainRunId,
    pub started_at: Timestamp,
    payload: Value,
    outputs: IndexMap<StepName, Value>,
    cancelled: Option<CancellationDetail>,
}

impl ChainRun {
    pub fn new(payload: Value) -> Self {
        Self {
            id: ChainRunId::new_random(),
            started_at: Timestamp::now(),
            payload,
            outputs: IndexMap::new(),
            cancelled: None,
        }
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Outputs in execution order.
    ///
    /// Recording a name twice replaces the value but keeps its first position.
    pub fn outputs(&self) -> &IndexMap<StepName, Value> {
        &self.outputs
    }

    pub fn cancellation(&self) -> Option<&CancellationDetail> {
        self.cancelled.as_ref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.is_some()
    }

    /// Records a completed step's output.
    pub fn record(&mut self, step: StepName, output: Value) {
        self.outputs.insert(step, output);
    }

    /// Marks the run cancelled; the detail also becomes the step's output.
    pub fn cancel(&mut self, detail: CancellationDetail) {
        self.outputs.insert(detail.step.clone(), detail.to_value());
        self.cancelled = Some(detail);
    }

    /// The payload's `from` field, when the payload is an object carrying one.
    pub fn reply_target(&self) -> Option<&Value> {
        self.payload.as_object()?.get("from")
    }

    /// Merges the outputs of `output_names` and packages the result.
    pub fn into_result(self, output_names: &[StepName]) -> MergedResult {
        let answers = merge_outputs(&self.outputs, output_names);
        let to = self.reply_target().cloned();
        MergedResult {
            answers,
            cancelled: self.cancelled,
            to,
        }
    }
}

/// The single result emitted for a processed payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedResult {
    pub answers: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<CancellationDetail>,
    /// Copied verbatim from the payload's `from` field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Value>,
}

impl MergedResult {
    /// The result as a JSON object: `answers`, then `cancelled` and `to` when set.
    pub fn into_value(self) -> Value {
        let mut out = Map::new();
        out.insert("answers".to_owned(), Value::Object(self.answers));
        if let Some(detail) = self.cancelled {
            out.insert("cancelled".to_owned(), detail.to_value());
        }
        if let Some(to) = self.to {
            out.insert("to".to_owned(), to);
        }
        Value::Object(out)
    }
}
