//! Chrome DevTools Protocol message types.
//!
//! Only the slice of the protocol this extension speaks: the request/response
//! envelope and the `Runtime` domain objects returned by `Runtime.evaluate`
//! and `Runtime.getProperties`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Envelope
// ============================================================================

/// CDP message sent to the inspector
#[derive(Debug, Clone, Serialize)]
pub struct CdpRequest {
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// CDP frame received from the inspector: a response when `id` is set,
/// an event when only `method` is
#[derive(Debug, Clone, Deserialize)]
pub struct CdpResponse {
    pub id: Option<u64>,
    pub result: Option<Value>,
    pub error: Option<CdpError>,
    pub method: Option<String>,
    pub params: Option<Value>,
}

/// CDP error in response
#[derive(Debug, Clone, Deserialize)]
pub struct CdpError {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

// ============================================================================
// Runtime domain
// ============================================================================

/// Mirror object for a value living in the remote context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// `NaN`, `Infinity`, `-Infinity`, `-0` and bigint literals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unserializable_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

impl RemoteObject {
    /// Convenience for a by-value string, as the encoder returns
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            kind: "string".to_string(),
            value: Some(Value::String(value.into())),
            ..Default::default()
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.value.as_ref().and_then(Value::as_str)
    }
}

/// Details of an exception thrown during `Runtime.evaluate`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    #[serde(default)]
    pub exception_id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub line_number: i64,
    #[serde(default)]
    pub column_number: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<RemoteObject>,
}

/// One property as `Runtime.getProperties` reports it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    pub name: String,
    /// Absent for accessor properties
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<RemoteObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<RemoteObject>,
    #[serde(default)]
    pub enumerable: bool,
    #[serde(default)]
    pub is_own: bool,
    /// Set for symbol-keyed properties
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<RemoteObject>,
}

/// Result of `Runtime.getProperties`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPropertiesResult {
    #[serde(default)]
    pub result: Vec<PropertyDescriptor>,
    #[serde(default)]
    pub exception_details: Option<ExceptionDetails>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdp_request_serialization() {
        let request = CdpRequest {
            id: 1,
            method: "Runtime.enable".to_string(),
            params: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"id\":1"));
        assert!(json.contains("\"method\":\"Runtime.enable\""));
        assert!(!json.contains("params"));
    }

    #[test]
    fn test_cdp_event_parsing() {
        let json = r#"{"method":"Runtime.executionContextsCleared","params":{}}"#;
        let response: CdpResponse = serde_json::from_str(json).unwrap();
        assert!(response.id.is_none());
        assert_eq!(
            response.method.as_deref(),
            Some("Runtime.executionContextsCleared")
        );
    }

    #[test]
    fn test_cdp_error_parsing() {
        let json = r#"{"id":7,"error":{"code":-32601,"message":"Method not found"}}"#;
        let response: CdpResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.id, Some(7));
        let error = response.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "Method not found");
    }

    #[test]
    fn test_remote_object_parsing() {
        let json = r#"{"type":"number","unserializableValue":"-Infinity","description":"-Infinity"}"#;
        let obj: RemoteObject = serde_json::from_str(json).unwrap();
        assert_eq!(obj.kind, "number");
        assert_eq!(obj.unserializable_value.as_deref(), Some("-Infinity"));
        assert!(obj.value.is_none());

        let obj = RemoteObject::string("$$4");
        assert_eq!(obj.as_str(), Some("$$4"));
    }

    #[test]
    fn test_exception_details_parsing() {
        let json = r#"{
            "exceptionId": 3,
            "text": "Uncaught",
            "lineNumber": 0,
            "columnNumber": 6,
            "exception": {"type":"object","subtype":"error","className":"Error",
                          "description":"Error: x\n    at <anonymous>:1:7"}
        }"#;
        let details: ExceptionDetails = serde_json::from_str(json).unwrap();
        assert_eq!(details.text, "Uncaught");
        let exception = details.exception.unwrap();
        assert_eq!(exception.subtype.as_deref(), Some("error"));
    }
}
