//! Prompt assembly for a single step.
//!
//! A step's user prompt is built from four pieces in fixed order: the intro
//! fragment, the incoming-payload block, the dependency block, and the ending
//! fragment. Empty pieces are skipped and the rest are joined by a blank line.

use indexmap::IndexMap;
use serde_json::Value;

use crate::{IncomingSelector, StepName};

/// Renders a value for injection into a prompt.
///
/// Objects and arrays become pretty-printed JSON (two-space indent), strings
/// are inserted verbatim, `null` renders as nothing, and other scalars use
/// their JSON text.
pub fn render_block(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Object(_) | Value::Array(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        Value::Bool(_) | Value::Number(_) => value.to_string(),
    }
}

/// Walks `path` through nested objects. Arrays are not indexed.
pub fn select_by_path<'a>(payload: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(payload, |current, segment| current.as_object()?.get(segment))
}

/// Renders the part of `payload` selected by `selector`.
pub fn incoming_block(selector: &IncomingSelector, payload: &Value) -> String {
    match selector {
        IncomingSelector::Whole => render_block(payload),
        IncomingSelector::Nothing => String::new(),
        IncomingSelector::Path(path) => select_by_path(payload, path)
            .map(render_block)
            .unwrap_or_default(),
    }
}

/// Renders the outputs of `dependencies` that exist in `outputs`, in listed order.
///
/// Names with no recorded output (not yet run, or never configured) are skipped.
pub fn dependency_block(dependencies: &[StepName], outputs: &IndexMap<StepName, Value>) -> String {
    dependencies
        .iter()
        .filter_map(|name| outputs.get(name.as_str()))
        .map(render_block)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_owned()
}

/// Joins the four prompt pieces, skipping whitespace-only ones.
///
/// The intro and ending are trimmed; the incoming block is kept as rendered.
pub fn assemble_prompt(intro: &str, incoming: &str, dependencies: &str, ending: &str) -> String {
    let pieces = [intro.trim(), incoming, dependencies.trim(), ending.trim()];
    pieces
        .into_iter()
        .filter(|piece| !piece.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim()
        .to_owned()
}
