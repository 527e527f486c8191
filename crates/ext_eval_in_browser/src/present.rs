//! Turning a Wire Result into something to show.

use serde::Serialize;
use tracing::debug;

use crate::wire::{WireResult, NO_RESULT_SENTINEL};
use crate::EvalError;

const CODE_FONT_CSS: &str = "line-height: 15px; font-size: 12px; font-family: SourceCodePro";

const ANSI_RED: &str = "\x1b[31m";
const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_RESET: &str = "\x1b[0m";

/// Visual treatment of a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Style {
    /// User code threw
    Error,
    /// Primitive or string value
    Success,
    /// Array or object preview
    Neutral,
}

/// A rendered result, ready for a popup surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    pub style: Style,
    /// Raw payload, unescaped
    pub text: String,
    /// Wrap the payload in double quotes
    pub quoted: bool,
}

impl Presentation {
    pub fn from_wire(wire: &WireResult) -> Self {
        let (style, quoted) = match wire {
            WireResult::Exception(_) => (Style::Error, false),
            WireResult::Primitive(_) => (Style::Success, false),
            WireResult::Str(_) => (Style::Success, true),
            WireResult::ArrayPreview(_) | WireResult::ObjectPreview(_) => (Style::Neutral, false),
        };
        Self {
            style,
            text: wire.payload().to_string(),
            quoted,
        }
    }

    /// Plain text as the user reads it, e.g. `Threw Error: x` or `"hi"`
    pub fn display_text(&self) -> String {
        let body = if self.quoted {
            format!("\"{}\"", self.text)
        } else {
            self.text.clone()
        };
        match self.style {
            Style::Error => format!("Threw {}", body),
            _ => body,
        }
    }

    /// HTML fragment; the payload is always escaped
    pub fn to_markup(&self) -> String {
        let code = format!(
            "<span style='{}'>{}</span>",
            CODE_FONT_CSS,
            html_escape::encode_text(&self.text)
        );
        match (self.style, self.quoted) {
            (Style::Error, _) => format!("<span style='color:red'>Threw {}</span>", code),
            (Style::Success, true) => format!("<span style='color:green'>\"{}\"</span>", code),
            (Style::Success, false) => format!("<span style='color:green'>{}</span>", code),
            (Style::Neutral, _) => format!("<span>{}</span>", code),
        }
    }

    /// Terminal rendering with ANSI colors
    pub fn to_ansi(&self) -> String {
        let text = self.display_text();
        match self.style {
            Style::Error => format!("{ANSI_RED}{text}{ANSI_RESET}"),
            Style::Success => format!("{ANSI_GREEN}{text}{ANSI_RESET}"),
            Style::Neutral => text,
        }
    }
}

/// Decodes Wire Results into presentations
#[derive(Debug, Clone, Default)]
pub struct Presenter {
    show_undefined: bool,
}

impl Presenter {
    pub fn new(show_undefined: bool) -> Self {
        Self { show_undefined }
    }

    /// Decode a raw Wire Result.
    ///
    /// `Ok(None)` means there is nothing to show; an unrecognized tag is an
    /// error for the caller to log.
    pub fn decode(&self, raw: &str) -> Result<Option<Presentation>, EvalError> {
        if raw == NO_RESULT_SENTINEL && !self.show_undefined {
            debug!("No result to display");
            return Ok(None);
        }
        let wire = WireResult::parse(raw)?;
        Ok(self.present(&wire))
    }

    /// Present an already-decoded result
    pub fn present(&self, wire: &WireResult) -> Option<Presentation> {
        if wire.is_no_result() && !self.show_undefined {
            return None;
        }
        Some(Presentation::from_wire(wire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(raw: &str) -> Presentation {
        Presenter::default().decode(raw).unwrap().unwrap()
    }

    #[test]
    fn test_number_scenario() {
        let p = decode("$$4");
        assert_eq!(p.style, Style::Success);
        assert_eq!(p.display_text(), "4");
        assert!(p.to_markup().starts_with("<span style='color:green'>"));
    }

    #[test]
    fn test_string_scenario() {
        let p = decode("$\"hi");
        assert_eq!(p.style, Style::Success);
        assert_eq!(p.display_text(), "\"hi\"");
        assert!(p.to_markup().contains("\"<span"));
    }

    #[test]
    fn test_array_scenario() {
        let p = decode("$[1,2,3");
        assert_eq!(p.style, Style::Neutral);
        assert_eq!(p.display_text(), "1,2,3");
        assert_eq!(
            p.to_markup(),
            format!("<span><span style='{}'>1,2,3</span></span>", CODE_FONT_CSS)
        );
    }

    #[test]
    fn test_null_scenario() {
        let p = decode("$$null");
        assert_eq!(p.style, Style::Success);
        assert_eq!(p.display_text(), "null");
    }

    #[test]
    fn test_exception_scenario() {
        let p = decode("$!Error: x");
        assert_eq!(p.style, Style::Error);
        assert_eq!(p.display_text(), "Threw Error: x");
        assert!(p.to_markup().starts_with("<span style='color:red'>Threw "));
        assert!(p.to_ansi().starts_with(ANSI_RED));
    }

    #[test]
    fn test_payload_is_escaped() {
        let p = decode("$\"<script>alert('x') & more</script>");
        let markup = p.to_markup();
        assert!(markup.contains("&lt;script&gt;"));
        assert!(markup.contains("&amp; more"));
        assert!(!markup.contains("<script>"));
        assert_eq!(p.text, "<script>alert('x') & more</script>");

        let p = decode("$!Error: a < b");
        assert!(p.to_markup().contains("a &lt; b"));
    }

    #[test]
    fn test_sentinel_suppressed() {
        assert!(Presenter::default().decode("$$undefined").unwrap().is_none());
        assert!(Presenter::default()
            .present(&WireResult::Primitive("undefined".into()))
            .is_none());
    }

    #[test]
    fn test_show_undefined() {
        let presenter = Presenter::new(true);
        let p = presenter.decode("$$undefined").unwrap().unwrap();
        assert_eq!(p.display_text(), "undefined");
    }

    #[test]
    fn test_string_undefined_is_not_sentinel() {
        let p = decode("$\"undefined");
        assert_eq!(p.display_text(), "\"undefined\"");
    }

    #[test]
    fn test_bad_tag() {
        let err = Presenter::default().decode("oops").unwrap_err();
        assert!(matches!(err, EvalError::BadWireResult { .. }));
    }

    #[test]
    fn test_round_trip_after_unescape() {
        use crate::encoder::{encode, RemoteValue};

        let values = [
            (RemoteValue::Number(42.0), "42"),
            (RemoteValue::Number(-1.5), "-1.5"),
            (RemoteValue::Bool(false), "false"),
            (RemoteValue::Str("a <b> & \"c\"".into()), "a <b> & \"c\""),
            (RemoteValue::Null, "null"),
            (RemoteValue::Undefined, "undefined"),
        ];
        let presenter = Presenter::new(true);
        for (value, literal) in values {
            let wire = encode(&value, 20).unwrap().to_wire();
            let p = presenter.decode(&wire).unwrap().unwrap();
            let escaped = html_escape::encode_text(&p.text).to_string();
            assert_eq!(html_escape::decode_html_entities(&escaped), literal);
        }
    }
}
