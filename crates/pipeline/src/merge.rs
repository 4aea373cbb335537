//! Output merging: many named step outputs into one flat answer mapping.
//!
//! Conflicts are resolved first-wins in output-name order. A key contributed
//! by an earlier output name is never overwritten by a later one.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::{StepName, StepSpec};

/// Chooses which step outputs are merged into the answers.
///
/// A configured list is used as is, even when empty. Otherwise the last step
/// that was scheduled to run is used, or the positional name `agent_<n>` when
/// no step was scheduled.
pub fn resolve_output_names(
    configured: Option<&[StepName]>,
    steps_to_run: &[StepSpec],
) -> Vec<StepName> {
    if let Some(configured) = configured {
        return configured.to_vec();
    }
    let last = steps_to_run
        .last()
        .map(|step| step.name.clone())
        .unwrap_or_else(|| StepName::positional(steps_to_run.len()));
    vec![last]
}

/// Merges the outputs named in `output_names` into one mapping.
///
/// Object outputs contribute their keys; any other output is stored under its
/// step name. Names with no recorded output are skipped.
pub fn merge_outputs(outputs: &IndexMap<StepName, Value>, output_names: &[StepName]) -> Map<String, Value> {
    let mut answers = Map::new();
    for name in output_names {
        let Some(output) = outputs.get(name.as_str()) else {
            continue;
        };
        match output {
            Value::Object(fields) => {
                for (key, value) in fields {
                    answers.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
            other => {
                answers
                    .entry(name.as_str().to_owned())
                    .or_insert_with(|| other.clone());
            }
        }
    }
    answers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Model, StepDefinitionSet};
    use serde_json::json;

    fn name(n: &str) -> StepName {
        StepName::new(n).unwrap()
    }

    fn outputs(entries: &[(&str, Value)]) -> IndexMap<StepName, Value> {
        entries
            .iter()
            .map(|(k, v)| (name(k), v.clone()))
            .collect()
    }

    #[test]
    fn earlier_output_names_win_key_conflicts() {
        let outs = outputs(&[
            ("b", json!({"k": "from b", "only_b": 2})),
            ("a", json!({"k": "from a", "only_a": 1})),
        ]);
        let answers = merge_outputs(&outs, &[name("a"), name("b")]);
        assert_eq!(
            Value::Object(answers),
            json!({"k": "from a", "only_a": 1, "only_b": 2})
        );
    }

    #[test]
    fn non_object_outputs_are_keyed_by_step_name() {
        let outs = outputs(&[("summary", json!("short text")), ("list", json!([1, 2]))]);
        let answers = merge_outputs(&outs, &[name("summary"), name("list")]);
        assert_eq!(
            Value::Object(answers),
            json!({"summary": "short text", "list": [1, 2]})
        );
    }

    #[test]
    fn step_name_key_respects_first_wins_against_object_keys() {
        let outs = outputs(&[("a", json!({"b": "from a"})), ("b", json!("plain b"))]);
        let answers = merge_outputs(&outs, &[name("a"), name("b")]);
        assert_eq!(Value::Object(answers), json!({"b": "from a"}));
    }

    #[test]
    fn absent_output_names_are_skipped() {
        let outs = outputs(&[("s1", json!({"y": 2}))]);
        let answers = merge_outputs(&outs, &[name("s3"), name("s1")]);
        assert_eq!(Value::Object(answers), json!({"y": 2}));
    }

    #[test]
    fn default_output_is_last_scheduled_step() {
        let set = StepDefinitionSet::from_value(
            &json!({"steps": [{"name": "s1"}, {"name": "s2"}]}),
            Model::default(),
        )
        .unwrap();
        assert_eq!(resolve_output_names(None, set.steps()), vec![name("s2")]);
        assert_eq!(
            resolve_output_names(Some(&[name("s1")][..]), set.steps()),
            vec![name("s1")]
        );
    }

    #[test]
    fn configured_but_empty_output_names_select_nothing() {
        let set = StepDefinitionSet::from_value(
            &json!({"steps": [{"name": "s1"}], "output_agents": [1]}),
            Model::default(),
        )
        .unwrap();
        assert!(resolve_output_names(set.output_agents(), set.steps()).is_empty());
    }

    #[test]
    fn default_output_for_empty_schedule_is_positional() {
        assert_eq!(resolve_output_names(None, &[]), vec![name("agent_0")]);
    }
}
