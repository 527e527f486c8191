//! Wire Result codec.
//!
//! The remote encoder answers every evaluation with one tagged string:
//!
//! | Tag  | Variant          | Payload                                   |
//! |------|------------------|-------------------------------------------|
//! | `$!` | `Exception`      | stringified thrown value                  |
//! | `$$` | `Primitive`      | number / boolean / `undefined` / `null` / `[function]` |
//! | `$"` | `Str`            | raw string, unescaped                     |
//! | `$[` | `ArrayPreview`   | comma-joined elements, capped             |
//! | `${` | `ObjectPreview`  | comma-joined `key:value` pairs, capped    |
//!
//! Previews carry no closing bracket and render without any: `$[1,2,3`
//! displays as `1,2,3`, `${a:1` as `a:1`.
//!
//! The string never outlives one popup; it is parsed straight into
//! [`WireResult`] and only the typed value travels further.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::EvalError;

/// Version of the tagged encoding produced by `remote_eval.js`.
pub const WIRE_VERSION: u32 = 1;

pub const TAG_EXCEPTION: &str = "$!";
pub const TAG_PRIMITIVE: &str = "$$";
pub const TAG_STRING: &str = "$\"";
pub const TAG_ARRAY: &str = "$[";
pub const TAG_OBJECT: &str = "${";

/// Full-string marker meaning "nothing worth showing".
pub const NO_RESULT_SENTINEL: &str = "$$undefined";

/// Placeholder payload for function results.
pub const FUNCTION_PLACEHOLDER: &str = "[function]";

/// Payload kind of a Wire Result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireTag {
    Exception,
    Primitive,
    Str,
    Array,
    Object,
}

impl WireTag {
    pub const ALL: [WireTag; 5] = [
        WireTag::Exception,
        WireTag::Primitive,
        WireTag::Str,
        WireTag::Array,
        WireTag::Object,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WireTag::Exception => TAG_EXCEPTION,
            WireTag::Primitive => TAG_PRIMITIVE,
            WireTag::Str => TAG_STRING,
            WireTag::Array => TAG_ARRAY,
            WireTag::Object => TAG_OBJECT,
        }
    }

    /// Match the tag at the start of a raw Wire Result
    pub fn from_prefix(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tag| raw.starts_with(tag.as_str()))
    }
}

/// A decoded Wire Result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum WireResult {
    /// User code raised; payload is the stringified raised value
    Exception(String),
    /// Number, boolean, `undefined`, `null` or the function placeholder
    Primitive(String),
    /// String result, raw
    Str(String),
    /// Array preview, already truncated by the encoder
    ArrayPreview(String),
    /// Plain-object preview, already truncated by the encoder
    ObjectPreview(String),
}

impl WireResult {
    /// Parse a raw tagged string.
    ///
    /// Tags are matched by literal prefix; anything else is a protocol
    /// mismatch between encoder and decoder.
    pub fn parse(raw: &str) -> Result<Self, EvalError> {
        let tag = WireTag::from_prefix(raw).ok_or_else(|| {
            EvalError::bad_wire_result(format!("unrecognized tag in {:?}", preview(raw)))
        })?;
        let payload = raw[tag.as_str().len()..].to_string();

        Ok(match tag {
            WireTag::Exception => WireResult::Exception(payload),
            WireTag::Primitive => WireResult::Primitive(payload),
            WireTag::Str => WireResult::Str(payload),
            WireTag::Array => WireResult::ArrayPreview(payload),
            WireTag::Object => WireResult::ObjectPreview(payload),
        })
    }

    pub fn tag(&self) -> WireTag {
        match self {
            WireResult::Exception(_) => WireTag::Exception,
            WireResult::Primitive(_) => WireTag::Primitive,
            WireResult::Str(_) => WireTag::Str,
            WireResult::ArrayPreview(_) => WireTag::Array,
            WireResult::ObjectPreview(_) => WireTag::Object,
        }
    }

    /// Raw, unescaped payload
    pub fn payload(&self) -> &str {
        match self {
            WireResult::Exception(p)
            | WireResult::Primitive(p)
            | WireResult::Str(p)
            | WireResult::ArrayPreview(p)
            | WireResult::ObjectPreview(p) => p,
        }
    }

    /// Encode back to the tagged string
    pub fn to_wire(&self) -> String {
        let payload = self.payload();
        let tag = self.tag().as_str();
        let mut out = String::with_capacity(tag.len() + payload.len());
        out.push_str(tag);
        out.push_str(payload);
        out
    }

    /// True for the value the sentinel `"$$undefined"` stands for.
    ///
    /// The codec keeps it as an ordinary `Primitive("undefined")`; whether that
    /// means "show nothing" is the presenter's call.
    pub fn is_no_result(&self) -> bool {
        matches!(self, WireResult::Primitive(p) if p == "undefined")
    }
}

impl fmt::Display for WireResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag().as_str())?;
        f.write_str(self.payload())
    }
}

impl FromStr for WireResult {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn preview(raw: &str) -> String {
    raw.chars().take(32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_each_tag() {
        assert_eq!(
            WireResult::parse("$!Error: x").unwrap(),
            WireResult::Exception("Error: x".into())
        );
        assert_eq!(
            WireResult::parse("$$4").unwrap(),
            WireResult::Primitive("4".into())
        );
        assert_eq!(
            WireResult::parse("$\"hi").unwrap(),
            WireResult::Str("hi".into())
        );
        assert_eq!(
            WireResult::parse("$[1,2,3").unwrap(),
            WireResult::ArrayPreview("1,2,3".into())
        );
        assert_eq!(
            WireResult::parse("${a:1,b:2").unwrap(),
            WireResult::ObjectPreview("a:1,b:2".into())
        );
    }

    #[test]
    fn test_parse_keeps_payload_raw() {
        let wire = WireResult::parse("$\"<b>\"quoted\"</b>").unwrap();
        assert_eq!(wire.payload(), "<b>\"quoted\"</b>");

        // tag characters inside the payload are not tags
        let wire = WireResult::parse("$\"$$$!").unwrap();
        assert_eq!(wire, WireResult::Str("$$$!".into()));
    }

    #[test]
    fn test_empty_payloads() {
        assert_eq!(WireResult::parse("$\"").unwrap(), WireResult::Str(String::new()));
        assert_eq!(
            WireResult::parse("$[").unwrap(),
            WireResult::ArrayPreview(String::new())
        );
    }

    #[test]
    fn test_unrecognized_tag() {
        for raw in ["", "$", "4", "$?what", "hello", "[1,2]"] {
            let err = WireResult::parse(raw).unwrap_err();
            assert!(matches!(err, EvalError::BadWireResult { .. }), "{raw:?}");
        }
    }

    #[test]
    fn test_sentinel_is_undefined_primitive() {
        let wire = WireResult::parse(NO_RESULT_SENTINEL).unwrap();
        assert_eq!(wire, WireResult::Primitive("undefined".into()));
        assert!(wire.is_no_result());
        assert!(!WireResult::Str("undefined".into()).is_no_result());
        assert!(!WireResult::Primitive("null".into()).is_no_result());
    }

    #[test]
    fn test_to_wire_and_display() {
        let wire = WireResult::ObjectPreview("a:1".into());
        assert_eq!(wire.to_wire(), "${a:1");
        assert_eq!(wire.to_string(), "${a:1");
        let parsed: WireResult = "$$true".parse().unwrap();
        assert_eq!(parsed.tag(), WireTag::Primitive);
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(WireResult::Str("hi".into())).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "str", "payload": "hi" }));
    }
}
