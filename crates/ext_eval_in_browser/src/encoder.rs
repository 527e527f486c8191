//! Producing Wire Results.
//!
//! Two encoders share one policy:
//!
//! - **Remote**: `remote_eval.js` travels as source text inside the
//!   `Runtime.evaluate` expression, re-declares itself in the tab's global
//!   scope and returns the tagged string. [`build_expression`] assembles that
//!   payload.
//! - **Local**: when the tab is asked to return the raw value by value, the
//!   same formatting runs here over [`RemoteValue`] with [`encode`].
//!
//! Policy: arrays and plain objects show at most `max_entries` elements/keys,
//! comma-joined, followed by `...N more` when truncated. Elements and values
//! use JavaScript string coercion, never recursive tagging.

use serde_json::Value;

use crate::cdp::{ExceptionDetails, RemoteObject};
use crate::wire::{WireResult, FUNCTION_PLACEHOLDER};
use crate::EvalError;

/// Encoder source shipped to the remote context
pub const REMOTE_ENCODER_SOURCE: &str = include_str!("remote_eval.js");

/// Name the encoder declares itself under in the remote context
pub const REMOTE_ENCODER_FN: &str = "__evalInBrowserEncode";

/// Default cap on previewed elements/keys
pub const DEFAULT_MAX_ENTRIES: usize = 20;

// ============================================================================
// Remote encoder payload
// ============================================================================

/// Build the `Runtime.evaluate` expression for `text`
pub fn build_expression(text: &str, max_entries: usize) -> String {
    format!(
        "{}\n{}(\"{}\", {});",
        REMOTE_ENCODER_SOURCE.trim_end(),
        REMOTE_ENCODER_FN,
        escape_js_string(text),
        max_entries
    )
}

/// Escape text for embedding inside a double-quoted JavaScript string literal
pub fn escape_js_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(c),
        }
    }
    out
}

// ============================================================================
// Local encoder
// ============================================================================

/// A value returned by value from the remote context
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<RemoteValue>),
    /// Own enumerable keys in enumeration order
    Object(Vec<(String, RemoteValue)>),
    /// Function, carrying its source text as `String(fn)` would
    Function(String),
    /// Anything outside the encoder's type switch (symbol, bigint, opaque handles)
    Other { kind: String, description: String },
}

impl RemoteValue {
    /// Convert a JSON value returned with `returnByValue`
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => RemoteValue::Null,
            Value::Bool(b) => RemoteValue::Bool(*b),
            Value::Number(n) => RemoteValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => RemoteValue::Str(s.clone()),
            Value::Array(items) => RemoteValue::Array(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => RemoteValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert a CDP mirror object
    pub fn from_remote_object(obj: &RemoteObject) -> Self {
        let description = || obj.description.clone().unwrap_or_default();

        match obj.kind.as_str() {
            "undefined" => RemoteValue::Undefined,
            "number" => match (&obj.unserializable_value, &obj.value) {
                (Some(raw), _) => RemoteValue::Number(parse_unserializable(raw)),
                (None, Some(v)) => RemoteValue::from_json(v),
                (None, None) => RemoteValue::Number(f64::NAN),
            },
            "boolean" | "string" => obj
                .value
                .as_ref()
                .map(RemoteValue::from_json)
                .unwrap_or(RemoteValue::Undefined),
            "function" => RemoteValue::Function(description()),
            "object" if obj.subtype.as_deref() == Some("null") => RemoteValue::Null,
            "object" => match &obj.value {
                Some(v) => RemoteValue::from_json(v),
                None => RemoteValue::Other {
                    kind: "object".to_string(),
                    description: description(),
                },
            },
            other => RemoteValue::Other {
                kind: other.to_string(),
                description: obj
                    .unserializable_value
                    .clone()
                    .unwrap_or_else(description),
            },
        }
    }

    /// `String(value)` as JavaScript would compute it
    pub fn to_js_string(&self) -> String {
        match self {
            RemoteValue::Undefined => "undefined".to_string(),
            RemoteValue::Null => "null".to_string(),
            RemoteValue::Bool(b) => b.to_string(),
            RemoteValue::Number(n) => js_number_to_string(*n),
            RemoteValue::Str(s) => s.clone(),
            // Array.prototype.join: holes, null and undefined become empty
            RemoteValue::Array(items) => items
                .iter()
                .map(|item| match item {
                    RemoteValue::Undefined | RemoteValue::Null => String::new(),
                    other => other.to_js_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            RemoteValue::Object(_) => "[object Object]".to_string(),
            RemoteValue::Function(source) => source.clone(),
            RemoteValue::Other { description, .. } => description.clone(),
        }
    }
}

/// Encode a value into a Wire Result
pub fn encode(value: &RemoteValue, max_entries: usize) -> Result<WireResult, EvalError> {
    Ok(match value {
        RemoteValue::Undefined | RemoteValue::Bool(_) | RemoteValue::Number(_) => {
            WireResult::Primitive(value.to_js_string())
        }
        RemoteValue::Null => WireResult::Primitive("null".to_string()),
        RemoteValue::Str(s) => WireResult::Str(s.clone()),
        RemoteValue::Function(_) => WireResult::Primitive(FUNCTION_PLACEHOLDER.to_string()),
        RemoteValue::Array(items) => WireResult::ArrayPreview(capped_join(
            items.iter().map(RemoteValue::to_js_string),
            items.len(),
            max_entries,
        )),
        RemoteValue::Object(entries) => WireResult::ObjectPreview(capped_join(
            entries
                .iter()
                .map(|(key, v)| format!("{}:{}", key, v.to_js_string())),
            entries.len(),
            max_entries,
        )),
        RemoteValue::Other { kind, description } => {
            return Err(EvalError::unsupported_type(format!("{kind} ({description})")));
        }
    })
}

/// Encode an exception reported by `Runtime.evaluate`
///
/// Error objects render as `"Name: message"` like `"" + err`, which is the
/// first line of the description (the rest is the stack).
pub fn encode_exception(details: &ExceptionDetails) -> WireResult {
    let text = match &details.exception {
        Some(obj) if obj.subtype.as_deref() == Some("error") => obj
            .description
            .as_deref()
            .and_then(|d| d.lines().next())
            .unwrap_or(&details.text)
            .to_string(),
        Some(obj) => RemoteValue::from_remote_object(obj).to_js_string(),
        None => details.text.clone(),
    };
    WireResult::Exception(text)
}

pub(crate) fn capped_join(
    parts: impl Iterator<Item = String>,
    total: usize,
    max_entries: usize,
) -> String {
    let shown: Vec<String> = parts.take(max_entries).collect();
    let mut out = shown.join(",");
    if total > shown.len() {
        out.push_str(&format!("...{} more", total - shown.len()));
    }
    out
}

fn parse_unserializable(raw: &str) -> f64 {
    match raw {
        "Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        "-0" => -0.0,
        _ => f64::NAN,
    }
}

/// Number-to-string conversion following ECMAScript `Number::toString`
pub fn js_number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    let abs = n.abs();
    if (1e-6..1e21).contains(&abs) {
        // Rust's shortest round-trip formatting matches JS in this range
        return format!("{}", n);
    }

    let exp = format!("{:e}", n);
    match exp.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        }
        _ => exp,
    }
}
