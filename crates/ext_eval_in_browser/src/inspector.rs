//! WebSocket client for a browser tab's DevTools endpoint.
//!
//! One socket per tab. Requests are correlated to responses by id through a
//! map of oneshot senders; a reader task resolves them, a writer task drains
//! the outgoing queue. Events are only logged: evaluation needs none of them.

use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, trace, warn};

use crate::cdp::{CdpRequest, CdpResponse};

/// Inspector protocol errors
#[derive(Debug, Error)]
pub enum InspectorError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Timeout waiting for response")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Method error: {code} - {message}")]
    MethodError { code: i32, message: String },
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<serde_json::Value, InspectorError>>>>>;

/// DevTools protocol client bound to one tab
pub struct InspectorClient {
    url: String,
    ws_tx: mpsc::Sender<Message>,
    pending: Pending,
    next_id: AtomicU64,
    connected: Arc<AtomicBool>,
    request_timeout: Duration,
}

impl InspectorClient {
    /// Connect to the tab's `webSocketDebuggerUrl`
    pub async fn connect(
        url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, InspectorError> {
        debug!(url = %url, "Connecting to browser inspector");

        let (ws_stream, _) = timeout(connect_timeout, connect_async(url))
            .await
            .map_err(|_| InspectorError::Timeout)?
            .map_err(|e| InspectorError::ConnectionFailed(e.to_string()))?;

        let (mut ws_write, mut ws_read) = ws_stream.split();
        let (ws_tx, mut ws_rx) = mpsc::channel::<Message>(64);

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));

        tokio::spawn(async move {
            while let Some(msg) = ws_rx.recv().await {
                if let Err(e) = ws_write.send(msg).await {
                    error!("WebSocket write error: {}", e);
                    break;
                }
            }
        });

        let reader_pending = pending.clone();
        let reader_connected = connected.clone();
        tokio::spawn(async move {
            while let Some(frame) = ws_read.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        trace!(msg = %text, "Received inspector frame");
                        dispatch_frame(&text, &reader_pending).await;
                    }
                    Ok(Message::Close(_)) => {
                        debug!("Inspector socket closed by browser");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("WebSocket read error: {}", e);
                        break;
                    }
                }
            }

            reader_connected.store(false, Ordering::SeqCst);

            let mut pending = reader_pending.lock().await;
            for (_, sender) in pending.drain() {
                let _ = sender.send(Err(InspectorError::ConnectionClosed));
            }
        });

        debug!(url = %url, "Connected to browser inspector");

        Ok(Self {
            url: url.to_string(),
            ws_tx,
            pending,
            next_id: AtomicU64::new(1),
            connected,
            request_timeout,
        })
    }

    /// Send a CDP method call and wait for its response
    pub async fn call(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, InspectorError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
        };
        let json = serde_json::to_string(&request)
            .map_err(|e| InspectorError::ProtocolError(e.to_string()))?;

        trace!(id = id, method = %method, "Sending inspector request");

        let (tx, rx) = oneshot::channel();
        {
            // Checked under the lock: the reader clears the flag before draining
            let mut pending = self.pending.lock().await;
            if !self.is_connected() {
                return Err(InspectorError::ConnectionClosed);
            }
            pending.insert(id, tx);
        }

        if let Err(e) = self.ws_tx.send(Message::Text(json)).await {
            self.pending.lock().await.remove(&id);
            return Err(InspectorError::WebSocketError(e.to_string()));
        }

        match timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(InspectorError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(InspectorError::Timeout)
            }
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Close the connection
    pub async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.ws_tx.send(Message::Close(None)).await;
    }
}

async fn dispatch_frame(text: &str, pending: &Pending) {
    let frame = match serde_json::from_str::<CdpResponse>(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Failed to parse inspector frame: {}", e);
            return;
        }
    };

    if let Some(id) = frame.id {
        let Some(sender) = pending.lock().await.remove(&id) else {
            debug!(id = id, "Response for unknown or expired request");
            return;
        };
        let result = match frame.error {
            Some(err) => Err(InspectorError::MethodError {
                code: err.code,
                message: err.message,
            }),
            None => Ok(frame.result.unwrap_or(serde_json::Value::Null)),
        };
        let _ = sender.send(result);
    } else if let Some(method) = frame.method {
        trace!(method = %method, "Ignoring inspector event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    /// Fake tab: answers every request with `{"echo": <method>}`, except
    /// `Fail.me` which gets a CDP error and `Close.me` which drops the socket.
    async fn spawn_fake_tab() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text(
                r#"{"method":"Runtime.executionContextCreated","params":{}}"#.to_string(),
            ))
            .await
            .unwrap();

            while let Some(Ok(Message::Text(text))) = ws.next().await {
                let request: serde_json::Value = serde_json::from_str(&text).unwrap();
                let id = request["id"].as_u64().unwrap();
                let method = request["method"].as_str().unwrap().to_string();
                let reply = match method.as_str() {
                    "Fail.me" => serde_json::json!({
                        "id": id,
                        "error": { "code": -32601, "message": "Method not found" }
                    }),
                    "Close.me" => break,
                    _ => serde_json::json!({ "id": id, "result": { "echo": method } }),
                };
                ws.send(Message::Text(reply.to_string())).await.unwrap();
            }
        });

        format!("ws://{}", addr)
    }

    #[tokio::test]
    async fn test_call_round_trip() {
        let url = spawn_fake_tab().await;
        let client = InspectorClient::connect(&url, Duration::from_secs(5), Duration::from_secs(5))
            .await
            .unwrap();

        let result = client.call("Runtime.evaluate", None).await.unwrap();
        assert_eq!(result["echo"], "Runtime.evaluate");
        assert_eq!(client.url(), url);
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_method_error() {
        let url = spawn_fake_tab().await;
        let client = InspectorClient::connect(&url, Duration::from_secs(5), Duration::from_secs(5))
            .await
            .unwrap();

        let err = client.call("Fail.me", None).await.unwrap_err();
        match err {
            InspectorError::MethodError { code, message } => {
                assert_eq!(code, -32601);
                assert_eq!(message, "Method not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pending_request_fails_when_socket_closes() {
        let url = spawn_fake_tab().await;
        let client = InspectorClient::connect(&url, Duration::from_secs(5), Duration::from_secs(5))
            .await
            .unwrap();

        let err = client.call("Close.me", None).await.unwrap_err();
        assert!(matches!(err, InspectorError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = InspectorClient::connect(
            &format!("ws://{}", addr),
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(result, Err(InspectorError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_call_after_close_is_rejected() {
        let url = spawn_fake_tab().await;
        let client = InspectorClient::connect(&url, Duration::from_secs(5), Duration::from_secs(5))
            .await
            .unwrap();
        client.close().await;

        let err = client.call("Runtime.evaluate", None).await.unwrap_err();
        assert!(matches!(err, InspectorError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_call_after_disconnect_fails_fast() {
        let url = spawn_fake_tab().await;
        let client =
            InspectorClient::connect(&url, Duration::from_secs(5), Duration::from_secs(600))
                .await
                .unwrap();

        let err = client.call("Close.me", None).await.unwrap_err();
        assert!(matches!(err, InspectorError::ConnectionClosed));
        for _ in 0..100 {
            if !client.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!client.is_connected());
        assert!(client.pending.lock().await.is_empty());

        // Must not wait out the ten-minute request timeout
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            client.call("Runtime.evaluate", None),
        )
        .await
        .expect("call after disconnect hung");
        assert!(matches!(result, Err(InspectorError::ConnectionClosed)));
        assert!(client.pending.lock().await.is_empty());
    }
}
