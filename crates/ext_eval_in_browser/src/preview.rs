//! Local previews of by-reference results.
//!
//! A `returnByValue` result is a JSON copy: `NaN`, `Infinity` and `undefined`
//! come back as `null`, and function-valued properties vanish. Preview mode
//! evaluates by reference instead and walks the mirror with
//! `Runtime.getProperties`, coercing every entry the way `"" + value` does in
//! the tab. The output is then the same Wire Result `remote_eval.js` produces.
//!
//! Two cases stay approximate. A user-defined `toString` on a nested object
//! is never called, and accessor properties read as `undefined`. Nested
//! arrays are followed [`MAX_DEPTH`] levels deep, which also ends cycles.

use std::collections::HashMap;

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::trace;

use crate::cdp::RemoteObject;
use crate::channel::EvalChannel;
use crate::encoder::{capped_join, encode, RemoteValue};
use crate::wire::WireResult;
use crate::EvalError;

/// Nesting depth up to which arrays are joined element by element
pub const MAX_DEPTH: usize = 8;

/// Nested arrays longer than this show their description instead
const MAX_JOIN_LENGTH: usize = 10_000;

/// Built-ins whose `String()` is `[object <Class>]`
const TAGGED_CLASSES: &[&str] = &[
    "Map", "Set", "WeakMap", "WeakSet", "Promise", "ArrayBuffer", "DataView",
];

/// Build the Wire Result for an evaluation result mirror
pub async fn preview(
    channel: &dyn EvalChannel,
    result: &RemoteObject,
    max_entries: usize,
) -> Result<WireResult, EvalError> {
    let object_id = match (result.kind.as_str(), result.object_id.as_deref()) {
        ("object", Some(id)) if result.subtype.as_deref() != Some("null") => id,
        _ => return encode(&RemoteValue::from_remote_object(result), max_entries),
    };

    if result.subtype.as_deref() == Some("array") {
        let slots = ArraySlots::load(channel, object_id).await?;
        let mut parts = Vec::new();
        for index in 0..slots.length.min(max_entries) {
            parts.push(match slots.get(index) {
                Some(element) => coerce(channel, element, 0).await?,
                None => "undefined".to_string(),
            });
        }
        trace!(length = slots.length, "Previewed array");
        return Ok(WireResult::ArrayPreview(capped_join(
            parts.into_iter(),
            slots.length,
            max_entries,
        )));
    }

    // Object.keys: own, enumerable, string-keyed
    let keys: Vec<_> = channel
        .get_properties(object_id)
        .await?
        .into_iter()
        .filter(|p| p.is_own && p.enumerable && p.symbol.is_none())
        .collect();

    let mut parts = Vec::new();
    for property in keys.iter().take(max_entries) {
        let value = match &property.value {
            Some(value) => coerce(channel, value, 0).await?,
            None => "undefined".to_string(),
        };
        parts.push(format!("{}:{}", property.name, value));
    }
    trace!(keys = keys.len(), "Previewed object");
    Ok(WireResult::ObjectPreview(capped_join(
        parts.into_iter(),
        keys.len(),
        max_entries,
    )))
}

/// Indexed elements of a remote array, holes left out
struct ArraySlots {
    length: usize,
    elements: HashMap<usize, RemoteObject>,
}

impl ArraySlots {
    async fn load(channel: &dyn EvalChannel, object_id: &str) -> Result<Self, EvalError> {
        let mut declared = None;
        let mut elements = HashMap::new();

        for property in channel.get_properties(object_id).await? {
            if !property.is_own || property.symbol.is_some() {
                continue;
            }
            if property.name == "length" {
                declared = property
                    .value
                    .as_ref()
                    .and_then(|v| v.value.as_ref())
                    .and_then(Value::as_u64)
                    .map(|n| n as usize);
            } else if let (Ok(index), Some(value)) =
                (property.name.parse::<usize>(), property.value)
            {
                elements.insert(index, value);
            }
        }

        // typed arrays keep `length` on the prototype
        let length =
            declared.unwrap_or_else(|| elements.keys().map(|i| i + 1).max().unwrap_or(0));
        Ok(Self { length, elements })
    }

    fn get(&self, index: usize) -> Option<&RemoteObject> {
        self.elements.get(&index)
    }
}

/// `"" + value`
fn coerce<'a>(
    channel: &'a dyn EvalChannel,
    value: &'a RemoteObject,
    depth: usize,
) -> BoxFuture<'a, Result<String, EvalError>> {
    async move {
        let description = value.description.clone().unwrap_or_default();
        Ok(match (value.kind.as_str(), value.subtype.as_deref()) {
            ("object", Some("null")) => "null".to_string(),
            ("object", Some("array" | "typedarray")) => match value.object_id.as_deref() {
                Some(id) if depth < MAX_DEPTH => join(channel, id, depth)
                    .await?
                    .unwrap_or(description),
                _ => description,
            },
            ("object", Some("date" | "regexp")) => description,
            ("object", Some("error")) => description.lines().next().unwrap_or_default().to_string(),
            ("object", _) => object_tag(value),
            ("bigint", _) => value
                .unserializable_value
                .as_deref()
                .unwrap_or(&description)
                .trim_end_matches('n')
                .to_string(),
            ("function" | "symbol", _) => description,
            _ => RemoteValue::from_remote_object(value).to_js_string(),
        })
    }
    .boxed()
}

/// `Array.prototype.join`: holes, `null` and `undefined` become empty
async fn join(
    channel: &dyn EvalChannel,
    object_id: &str,
    depth: usize,
) -> Result<Option<String>, EvalError> {
    let slots = ArraySlots::load(channel, object_id).await?;
    if slots.length > MAX_JOIN_LENGTH {
        return Ok(None);
    }

    let mut parts = Vec::with_capacity(slots.length);
    for index in 0..slots.length {
        parts.push(match slots.get(index) {
            Some(element) if !is_nullish(element) => coerce(channel, element, depth + 1).await?,
            _ => String::new(),
        });
    }
    Ok(Some(parts.join(",")))
}

fn is_nullish(value: &RemoteObject) -> bool {
    value.kind == "undefined" || (value.kind == "object" && value.subtype.as_deref() == Some("null"))
}

fn object_tag(value: &RemoteObject) -> String {
    match value.class_name.as_deref() {
        Some(name) if TAGGED_CLASSES.contains(&name) => format!("[object {name}]"),
        _ => "[object Object]".to_string(),
    }
}
