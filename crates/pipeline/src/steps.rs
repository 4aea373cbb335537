//! The step definition set: the ordered list of configured steps.
//!
//! Loaded once from a JSON document of the form
//!
//! ```json
//! {
//!   "system_prompt": "...",
//!   "steps": [{ "name": "s1", "prompt_intro": "...", "use_payload_from": [] }],
//!   "output_agents": ["s1"]
//! }
//! ```
//!
//! Only the *shape* of `steps` and `output_agents` is validated. Every
//! per-field problem (unknown model, non-string prompt, odd
//! `include_incoming` value) falls back to a default instead of failing.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{Model, ResponseFormat, StepName, StepchainError};

/// System prompt used when neither the document nor the step provides one.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an assistant helping other agents with their requests.";

/// Which part of the inbound payload a step's prompt includes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingSelector {
    /// The whole payload (`include_incoming: true`, or the field is absent).
    Whole,
    /// Nothing (`false`, or any value that is neither a bool nor a string).
    Nothing,
    /// A dotted path through nested objects, e.g. `"raw.questions"`.
    Path(Vec<String>),
}

impl IncomingSelector {
    fn from_config(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Bool(true)) => IncomingSelector::Whole,
            Some(Value::String(path)) => {
                IncomingSelector::Path(path.split('.').map(str::to_owned).collect())
            }
            Some(_) => IncomingSelector::Nothing,
        }
    }
}

/// One configured step. Immutable after load.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSpec {
    /// Key under which the step's output is recorded.
    pub name: StepName,
    /// Text placed before the incoming and dependency blocks.
    pub prompt_intro: String,
    /// Text placed after them.
    pub prompt_ending: String,
    pub include_incoming: IncomingSelector,
    /// Names of earlier steps whose outputs are injected, in this order.
    pub dependencies: Vec<StepName>,
    /// Content of the system message.
    pub system_prompt: String,
    pub model: Model,
    /// Sent only when configured as a JSON number.
    pub temperature: Option<f64>,
    pub response_format: ResponseFormat,
}

impl StepSpec {
    /// Builds a step from its JSON object. `position` is 1-based.
    fn from_config(
        position: usize,
        step: &Map<String, Value>,
        system_prompt: &str,
        default_model: Model,
    ) -> Self {
        let name = step
            .get("name")
            .and_then(Value::as_str)
            .and_then(StepName::new)
            .unwrap_or_else(|| StepName::positional(position));

        let dependencies = step
            .get("use_payload_from")
            .or_else(|| step.get("dependencies"))
            .and_then(Value::as_array)
            .map(|deps| {
                deps.iter()
                    .filter_map(Value::as_str)
                    .filter_map(StepName::new)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name,
            prompt_intro: string_field(step, "prompt_intro"),
            prompt_ending: string_field(step, "prompt_ending"),
            include_incoming: IncomingSelector::from_config(step.get("include_incoming")),
            dependencies,
            system_prompt: step
                .get("system_prompt")
                .and_then(Value::as_str)
                .unwrap_or(system_prompt)
                .to_owned(),
            model: Model::sanitize(step.get("model"), default_model),
            temperature: step.get("temperature").and_then(Value::as_f64),
            response_format: ResponseFormat::sanitize(step.get("response_format")),
        }
    }
}

fn string_field(step: &Map<String, Value>, key: &str) -> String {
    step.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

/// The ordered, read-only list of steps plus the output-agent selection.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDefinitionSet {
    steps: Vec<StepSpec>,
    /// `None` when the document names no output agents.
    output_agents: Option<Vec<StepName>>,
    system_prompt: String,
}

impl StepDefinitionSet {
    /// Parses a step configuration document.
    ///
    /// `default_model` is used for steps without a `model` field; unsupported
    /// values become [`Model::Gpt4oMini`].
    pub fn from_json_str(text: &str, default_model: Model) -> Result<Self, StepchainError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| StepchainError::config(format!("steps config is not valid JSON: {e}")))?;
        Self::from_value(&value, default_model)
    }

    /// Builds the set from an already-parsed document.
    pub fn from_value(document: &Value, default_model: Model) -> Result<Self, StepchainError> {
        let document = document
            .as_object()
            .ok_or_else(|| StepchainError::config("steps config must be a JSON object"))?;

        let system_prompt = document
            .get("system_prompt")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
            .to_owned();

        let raw_steps = match document.get("steps") {
            None | Some(Value::Null) => &[][..],
            Some(Value::Array(items)) => items.as_slice(),
            Some(_) => {
                return Err(StepchainError::config(
                    "'steps' must be a list in the steps JSON config.",
                ))
            }
        };

        // A non-empty list counts as configured even if none of its entries
        // is a usable name.
        let output_agents = match document.get("output_agents") {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) if items.is_empty() => None,
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(StepName::new)
                    .collect(),
            ),
            Some(_) => {
                return Err(StepchainError::config(
                    "'output_agents' must be a list in the steps JSON config.",
                ))
            }
        };

        let mut steps = Vec::with_capacity(raw_steps.len());
        let mut seen = HashSet::new();
        for (index, raw) in raw_steps.iter().enumerate() {
            let object = raw.as_object().ok_or_else(|| {
                StepchainError::config(format!("step #{} must be a JSON object", index + 1))
            })?;
            let step = StepSpec::from_config(index + 1, object, &system_prompt, default_model);
            if !seen.insert(step.name.clone()) {
                warn!(step = %step.name, "duplicate step name; later outputs shadow earlier ones");
            }
            steps.push(step);
        }

        debug!(
            steps = steps.len(),
            output_agents = output_agents.as_ref().map_or(0, Vec::len),
            "step definitions loaded"
        );

        Ok(Self {
            steps,
            output_agents,
            system_prompt,
        })
    }

    /// All configured steps, in execution order.
    pub fn steps(&self) -> &[StepSpec] {
        &self.steps
    }

    /// The configured output-agent names, or `None` when the default output
    /// applies. A configured list may be empty after invalid entries are dropped.
    pub fn output_agents(&self) -> Option<&[StepName]> {
        self.output_agents.as_deref()
    }

    /// The document-level default system prompt.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn load(document: Value) -> StepDefinitionSet {
        StepDefinitionSet::from_value(&document, Model::Gpt4oMini).unwrap()
    }

    #[test]
    fn missing_fields_take_defaults() {
        let set = load(json!({"steps": [{}]}));
        let step = &set.steps()[0];
        assert_eq!(step.name.as_str(), "agent_1");
        assert_eq!(step.prompt_intro, "");
        assert_eq!(step.prompt_ending, "");
        assert_eq!(step.include_incoming, IncomingSelector::Whole);
        assert!(step.dependencies.is_empty());
        assert_eq!(step.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(step.model, Model::Gpt4oMini);
        assert_eq!(step.temperature, None);
        assert_eq!(step.response_format, ResponseFormat::Json);
        assert_eq!(set.output_agents(), None);
    }

    #[test]
    fn positional_names_follow_list_position() {
        let set = load(json!({"steps": [{"name": "first"}, {"name": ""}, {}]}));
        let names: Vec<_> = set.steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["first", "agent_2", "agent_3"]);
    }

    #[test]
    fn document_system_prompt_is_the_step_default() {
        let set = load(json!({
            "system_prompt": "Be terse.",
            "steps": [{}, {"system_prompt": "Be verbose."}]
        }));
        assert_eq!(set.system_prompt(), "Be terse.");
        assert_eq!(set.steps()[0].system_prompt, "Be terse.");
        assert_eq!(set.steps()[1].system_prompt, "Be verbose.");
    }

    #[test]
    fn include_incoming_accepts_bool_path_and_ignores_others() {
        let set = load(json!({"steps": [
            {"include_incoming": true},
            {"include_incoming": false},
            {"include_incoming": "raw.questions"},
            {"include_incoming": 3}
        ]}));
        let selectors: Vec<_> = set.steps().iter().map(|s| &s.include_incoming).collect();
        assert_eq!(selectors[0], &IncomingSelector::Whole);
        assert_eq!(selectors[1], &IncomingSelector::Nothing);
        assert_eq!(
            selectors[2],
            &IncomingSelector::Path(vec!["raw".into(), "questions".into()])
        );
        assert_eq!(selectors[3], &IncomingSelector::Nothing);
    }

    #[test]
    fn dependencies_read_from_either_key_and_skip_junk() {
        let set = load(json!({"steps": [
            {"use_payload_from": ["a", 7, "b"]},
            {"dependencies": ["c"]},
            {"use_payload_from": "a"}
        ]}));
        let deps = |i: usize| -> Vec<&str> {
            set.steps()[i].dependencies.iter().map(|d| d.as_str()).collect()
        };
        assert_eq!(deps(0), ["a", "b"]);
        assert_eq!(deps(1), ["c"]);
        assert!(deps(2).is_empty());
    }

    #[test]
    fn malformed_step_fields_are_not_fatal() {
        let set = load(json!({"steps": [{
            "prompt_intro": {"not": "a string"},
            "model": "gpt-9",
            "temperature": "hot",
            "response_format": "xml"
        }]}));
        let step = &set.steps()[0];
        assert_eq!(step.prompt_intro, "");
        assert_eq!(step.model, Model::Gpt4oMini);
        assert_eq!(step.temperature, None);
        assert_eq!(step.response_format, ResponseFormat::Json);
    }

    #[test]
    fn only_an_absent_model_uses_the_process_model() {
        let set = StepDefinitionSet::from_value(
            &json!({"steps": [
                {"model": "claude"},
                {"model": null},
                {},
                {"model": "gpt-4o-mini"}
            ]}),
            Model::Gpt4o,
        )
        .unwrap();
        let models: Vec<_> = set.steps().iter().map(|s| s.model).collect();
        assert_eq!(
            models,
            [Model::Gpt4oMini, Model::Gpt4oMini, Model::Gpt4o, Model::Gpt4oMini]
        );
    }

    #[test]
    fn null_system_prompt_falls_back_to_document_prompt() {
        let set = load(json!({"system_prompt": "Be terse.", "steps": [{"system_prompt": null}]}));
        assert_eq!(set.steps()[0].system_prompt, "Be terse.");
    }

    #[test]
    fn steps_must_be_a_list() {
        let err = StepDefinitionSet::from_value(&json!({"steps": {"s1": {}}}), Model::Gpt4oMini)
            .unwrap_err();
        assert!(matches!(err, StepchainError::ConfigurationError { .. }));
        assert!(err.to_string().contains("'steps' must be a list"));
    }

    #[test]
    fn output_agents_must_be_a_list() {
        let err = StepDefinitionSet::from_value(
            &json!({"steps": [], "output_agents": "s1"}),
            Model::Gpt4oMini,
        )
        .unwrap_err();
        assert!(err.to_string().contains("'output_agents' must be a list"));
    }

    #[test]
    fn null_lists_are_treated_as_empty() {
        let set = load(json!({"steps": null, "output_agents": null}));
        assert!(set.is_empty());
        assert_eq!(set.output_agents(), None);
    }

    #[test]
    fn empty_output_agents_list_is_unconfigured() {
        let set = load(json!({"steps": [], "output_agents": []}));
        assert_eq!(set.output_agents(), None);
    }

    #[test]
    fn output_agents_drop_non_strings() {
        let set = load(json!({"steps": [], "output_agents": ["a", 1, null, "b"]}));
        let names: Vec<_> = set
            .output_agents()
            .unwrap()
            .iter()
            .map(|n| n.as_str())
            .collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn output_agents_without_usable_names_stay_configured() {
        for agents in [json!([1]), json!([""]), json!([null, false])] {
            let set = load(json!({"steps": [{"name": "s1"}], "output_agents": agents}));
            assert_eq!(set.output_agents(), Some(&[][..]));
        }
    }

    #[test]
    fn duplicate_names_are_kept_in_order() {
        let set = load(json!({"steps": [{"name": "x"}, {"name": "x"}]}));
        assert_eq!(set.len(), 2);
        assert!(set.steps().iter().all(|s| s.name.as_str() == "x"));
    }

    #[test]
    fn invalid_json_is_a_configuration_error() {
        let err = StepDefinitionSet::from_json_str("{steps: ", Model::Gpt4oMini).unwrap_err();
        assert!(matches!(err, StepchainError::ConfigurationError { .. }));
    }

    #[test]
    fn non_object_steps_are_rejected() {
        let err = StepDefinitionSet::from_value(&json!({"steps": ["s1"]}), Model::Gpt4oMini)
            .unwrap_err();
        assert!(err.to_string().contains("step #1"));
    }
}
