//! Locating the browser tab to evaluate in.
//!
//! A browser started with `--remote-debugging-port` lists its targets at
//! `http://<host>:<port>/json/list`. The first `page` target whose URL
//! contains the configured filter wins.

use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::EvalError;

/// One entry of `/json/list`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    /// Absent while another client is attached to the tab
    #[serde(default)]
    pub web_socket_debugger_url: Option<String>,
}

/// Where to reach the inspector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A tab's WebSocket URL, used as-is
    WebSocket(String),
    /// A debugging port to discover tabs on
    Port { host: String, port: u16 },
}

impl Endpoint {
    /// Parse a user-supplied endpoint: `ws://...`, `host:port` or a bare port
    pub fn parse(raw: &str, default_host: &str) -> Result<Self, EvalError> {
        let raw = raw.trim();
        if raw.starts_with("ws://") || raw.starts_with("wss://") {
            return Ok(Endpoint::WebSocket(raw.to_string()));
        }

        let (host, port) = match raw.rsplit_once(':') {
            Some((host, port)) => (host.to_string(), port),
            None => (default_host.to_string(), raw),
        };
        let port = port
            .parse::<u16>()
            .map_err(|_| EvalError::config(format!("invalid inspector endpoint: {raw}")))?;
        Ok(Endpoint::Port { host, port })
    }
}

/// Pick the tab to attach to
pub fn select_target<'a>(targets: &'a [TargetInfo], url_filter: Option<&str>) -> Option<&'a TargetInfo> {
    targets.iter().find(|t| {
        t.kind == "page"
            && t.web_socket_debugger_url.is_some()
            && url_filter.map_or(true, |filter| t.url.contains(filter))
    })
}

/// Fetch `/json/list` and resolve the chosen tab's WebSocket URL
pub async fn discover_target(
    host: &str,
    port: u16,
    url_filter: Option<&str>,
    request_timeout: Duration,
) -> Result<String, EvalError> {
    let list_url = format!("http://{}:{}/json/list", host, port);
    debug!(url = %list_url, "Listing debuggable targets");

    let client = reqwest::Client::builder()
        .no_proxy()
        .timeout(request_timeout)
        .build()
        .map_err(|e| EvalError::discovery(e.to_string()))?;

    let targets: Vec<TargetInfo> = client
        .get(&list_url)
        .send()
        .await
        .map_err(|e| {
            EvalError::discovery(format!(
                "cannot reach {list_url}; is the browser running with --remote-debugging-port={port}? ({e})"
            ))
        })?
        .json()
        .await
        .map_err(|e| EvalError::discovery(format!("invalid target list: {e}")))?;

    let target = select_target(&targets, url_filter).ok_or_else(|| {
        EvalError::discovery(match url_filter {
            Some(filter) => format!("no page target matching {filter:?}"),
            None => "no page target available".to_string(),
        })
    })?;

    debug!(id = %target.id, title = %target.title, url = %target.url, "Selected target");

    target
        .web_socket_debugger_url
        .clone()
        .ok_or_else(|| EvalError::discovery("target has no debugger URL"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets() -> Vec<TargetInfo> {
        serde_json::from_str(
            r#"[
            {"id":"sw","type":"service_worker","url":"http://localhost:8080/sw.js",
             "webSocketDebuggerUrl":"ws://127.0.0.1:9222/devtools/page/sw"},
            {"id":"busy","type":"page","url":"http://localhost:8080/attached.html"},
            {"id":"docs","type":"page","title":"Docs","url":"https://docs.example.com/",
             "webSocketDebuggerUrl":"ws://127.0.0.1:9222/devtools/page/docs"},
            {"id":"app","type":"page","title":"App","url":"http://localhost:8080/index.html",
             "webSocketDebuggerUrl":"ws://127.0.0.1:9222/devtools/page/app"}
        ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_select_first_page() {
        let targets = targets();
        assert_eq!(select_target(&targets, None).unwrap().id, "docs");
    }

    #[test]
    fn test_select_with_filter() {
        let targets = targets();
        assert_eq!(select_target(&targets, Some("localhost:8080")).unwrap().id, "app");
        assert!(select_target(&targets, Some("nowhere")).is_none());
    }

    #[test]
    fn test_endpoint_parse() {
        assert_eq!(
            Endpoint::parse("ws://127.0.0.1:9222/devtools/page/x", "127.0.0.1").unwrap(),
            Endpoint::WebSocket("ws://127.0.0.1:9222/devtools/page/x".into())
        );
        assert_eq!(
            Endpoint::parse("9333", "127.0.0.1").unwrap(),
            Endpoint::Port {
                host: "127.0.0.1".into(),
                port: 9333
            }
        );
        assert_eq!(
            Endpoint::parse("devbox:9222", "127.0.0.1").unwrap(),
            Endpoint::Port {
                host: "devbox".into(),
                port: 9222
            }
        );
        assert!(Endpoint::parse("not-a-port", "127.0.0.1").is_err());
    }
}
