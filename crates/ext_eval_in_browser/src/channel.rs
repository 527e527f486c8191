//! The remote evaluation channel.
//!
//! [`EvalChannel`] is the seam between the command handler and whatever can
//! run JavaScript in the tab. Each call is one `Runtime.evaluate` and resolves
//! exactly once; callers may have several in flight.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::cdp::{ExceptionDetails, GetPropertiesResult, PropertyDescriptor, RemoteObject};
use crate::config::InspectorConfig;
use crate::inspector::InspectorClient;
use crate::target::{discover_target, Endpoint};
use crate::EvalError;

/// Object group holding remote objects created by evaluations
pub const OBJECT_GROUP: &str = "eval-in-browser";

/// Parameters of `Runtime.evaluate`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalRequest {
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_group: Option<String>,
    pub return_by_value: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub silent: bool,
}

impl EvalRequest {
    /// Request whose result comes back by value
    pub fn by_value(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            object_group: Some(OBJECT_GROUP.to_string()),
            return_by_value: true,
            silent: false,
        }
    }

    /// Request whose result comes back as a mirror with an `objectId`
    pub fn by_reference(expression: impl Into<String>) -> Self {
        Self {
            return_by_value: false,
            ..Self::by_value(expression)
        }
    }
}

/// Result of `Runtime.evaluate`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalResponse {
    #[serde(default)]
    pub result: RemoteObject,
    /// Legacy protocol flag, superseded by `exceptionDetails`
    #[serde(default)]
    pub was_thrown: bool,
    #[serde(default)]
    pub exception_details: Option<ExceptionDetails>,
}

impl EvalResponse {
    pub fn value(result: RemoteObject) -> Self {
        Self {
            result,
            ..Default::default()
        }
    }

    /// Whether the evaluated expression threw
    pub fn threw(&self) -> bool {
        self.was_thrown || self.exception_details.is_some()
    }

    /// Best available description of what was thrown
    pub fn exception_text(&self) -> String {
        self.exception_details
            .as_ref()
            .and_then(|d| d.exception.as_ref())
            .and_then(|e| e.description.clone())
            .or_else(|| self.result.description.clone())
            .or_else(|| self.exception_details.as_ref().map(|d| d.text.clone()))
            .unwrap_or_else(|| "unknown exception".to_string())
    }
}

/// Something that can evaluate JavaScript in the remote context
#[async_trait]
pub trait EvalChannel: Send + Sync {
    /// Run one evaluation; resolves exactly once
    async fn evaluate(&self, request: EvalRequest) -> Result<EvalResponse, EvalError>;

    /// Own properties of a remote object, in property order
    async fn get_properties(&self, object_id: &str) -> Result<Vec<PropertyDescriptor>, EvalError>;

    /// Let the tab drop the mirrors of a finished evaluation
    async fn release_object_group(&self, _group: &str) -> Result<(), EvalError> {
        Ok(())
    }

    fn is_connected(&self) -> bool;
}

#[async_trait]
impl EvalChannel for InspectorClient {
    async fn evaluate(&self, request: EvalRequest) -> Result<EvalResponse, EvalError> {
        let params = serde_json::to_value(&request)
            .map_err(|e| EvalError::transport(e.to_string()))?;
        let result = self.call("Runtime.evaluate", Some(params)).await?;
        serde_json::from_value(result)
            .map_err(|e| EvalError::transport(format!("malformed Runtime.evaluate result: {e}")))
    }

    async fn get_properties(&self, object_id: &str) -> Result<Vec<PropertyDescriptor>, EvalError> {
        let params = json!({ "objectId": object_id, "ownProperties": true });
        let result = self.call("Runtime.getProperties", Some(params)).await?;
        let result: GetPropertiesResult = serde_json::from_value(result).map_err(|e| {
            EvalError::transport(format!("malformed Runtime.getProperties result: {e}"))
        })?;
        if let Some(details) = result.exception_details {
            return Err(EvalError::transport(format!(
                "Runtime.getProperties threw: {}",
                details.text
            )));
        }
        Ok(result.result)
    }

    async fn release_object_group(&self, group: &str) -> Result<(), EvalError> {
        self.call("Runtime.releaseObjectGroup", Some(json!({ "objectGroup": group })))
            .await?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        InspectorClient::is_connected(self)
    }
}

/// Resolve the configured endpoint and connect to the tab
pub async fn connect(config: &InspectorConfig) -> Result<InspectorClient, EvalError> {
    let connect_timeout = Duration::from_millis(config.connect_timeout_ms);
    let request_timeout = Duration::from_millis(config.request_timeout_ms);

    let endpoint = match &config.endpoint {
        Some(raw) => Endpoint::parse(raw, &config.host)?,
        None => Endpoint::Port {
            host: config.host.clone(),
            port: config.port,
        },
    };

    let ws_url = match endpoint {
        Endpoint::WebSocket(url) => url,
        Endpoint::Port { host, port } => {
            discover_target(&host, port, config.target_url.as_deref(), connect_timeout).await?
        }
    };

    let client = InspectorClient::connect(&ws_url, connect_timeout, request_timeout).await?;
    debug!(url = %ws_url, "Evaluation channel ready");
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = EvalRequest::by_value("1+1");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            json!({
                "expression": "1+1",
                "objectGroup": "eval-in-browser",
                "returnByValue": true
            })
        );
    }

    #[test]
    fn test_by_reference_request() {
        let json = serde_json::to_value(EvalRequest::by_reference("[1]")).unwrap();
        assert_eq!(json["returnByValue"], false);
        assert_eq!(json["objectGroup"], OBJECT_GROUP);
    }

    #[test]
    fn test_get_properties_result_parsing() {
        let result: GetPropertiesResult = serde_json::from_value(json!({
            "result": [
                { "name": "0", "value": { "type": "number", "unserializableValue": "NaN",
                  "description": "NaN" }, "writable": true, "configurable": true,
                  "enumerable": true, "isOwn": true },
                { "name": "length", "value": { "type": "number", "value": 1, "description": "1" },
                  "writable": true, "configurable": false, "enumerable": false, "isOwn": true },
                { "name": "Symbol(tag)", "symbol": { "type": "symbol", "description": "Symbol(tag)" },
                  "value": { "type": "string", "value": "x" },
                  "enumerable": true, "isOwn": true }
            ]
        }))
        .unwrap();
        assert_eq!(result.result.len(), 3);
        assert_eq!(
            result.result[0].value.as_ref().unwrap().unserializable_value.as_deref(),
            Some("NaN")
        );
        assert!(!result.result[1].enumerable);
        assert!(result.result[2].symbol.is_some());
    }

    #[test]
    fn test_response_success() {
        let response: EvalResponse =
            serde_json::from_value(json!({ "result": { "type": "string", "value": "$$4" } }))
                .unwrap();
        assert!(!response.threw());
        assert_eq!(response.result.as_str(), Some("$$4"));
    }

    #[test]
    fn test_response_thrown_modern_and_legacy() {
        let modern: EvalResponse = serde_json::from_value(json!({
            "result": { "type": "object", "subtype": "error", "description": "SyntaxError: Unexpected token" },
            "exceptionDetails": {
                "exceptionId": 1, "text": "Uncaught", "lineNumber": 0, "columnNumber": 0,
                "exception": { "type": "object", "subtype": "error",
                               "description": "SyntaxError: Unexpected token" }
            }
        }))
        .unwrap();
        assert!(modern.threw());
        assert_eq!(modern.exception_text(), "SyntaxError: Unexpected token");

        let legacy: EvalResponse = serde_json::from_value(json!({
            "result": { "type": "object", "description": "ReferenceError: x is not defined" },
            "wasThrown": true
        }))
        .unwrap();
        assert!(legacy.threw());
        assert_eq!(legacy.exception_text(), "ReferenceError: x is not defined");
    }
}
