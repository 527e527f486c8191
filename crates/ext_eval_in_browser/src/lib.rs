//! Evaluate-in-browser extension for code editors
//!
//! Sends the JavaScript selected in a code editor to a live browser tab over the
//! Chrome DevTools Protocol, then shows the returned value as a transient popup
//! anchored under the selection.
//!
//! ```text
//!  editor selection ──► EvalCommand ──► EvalChannel (Runtime.evaluate)
//!                                            │
//!                    remote_eval.js ◄────────┘  runs in the tab, returns a Wire Result
//!                                            │
//!  Popup ◄── Presenter ◄── WireResult::parse ◄┘
//! ```
//!
//! Modules:
//! - [`wire`] - the tagged Wire Result codec (`$!`, `$$`, `$"`, `$[`, `${`)
//! - [`encoder`] - the remote encoder script and its local Rust twin
//! - [`cdp`] / [`inspector`] / [`target`] - CDP types, WebSocket client, tab discovery
//! - [`channel`] - the evaluation channel seam
//! - [`present`] - Wire Result to styled markup
//! - [`preview`] - preview mode: Wire Results built from by-reference mirrors
//! - [`popup`] - the single reusable popup and its dwell timer
//! - [`editor`] / [`command`] - host editor seams and the eval command
//! - [`config`] - `eval-in-browser.toml`
//!
//! Error codes: 9800-9899

use serde::Serialize;
use thiserror::Error;

pub mod cdp;
pub mod channel;
pub mod command;
pub mod config;
pub mod editor;
pub mod encoder;
pub mod inspector;
pub mod popup;
pub mod present;
pub mod preview;
pub mod target;
pub mod wire;

pub use channel::{EvalChannel, EvalRequest, EvalResponse};
pub use command::{register_commands, CommandRegistry, CommandSpec, CommandTable, EvalCommand};
pub use config::{EvalConfig, EvalMode};
pub use editor::{BufferEditor, Editor, EditorHost, LiveStatus, Position, Selection};
pub use encoder::{build_expression, encode, RemoteValue};
pub use inspector::{InspectorClient, InspectorError};
pub use popup::{Popup, PopupState, PopupSurface};
pub use present::{Presentation, Presenter, Style};
pub use wire::{WireResult, WireTag, WIRE_VERSION};

// ============================================================================
// Error Types (Error codes 9800-9899)
// ============================================================================

/// Error codes for eval-in-browser operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EvalErrorCode {
    /// Generic error
    Generic = 9800,
    /// No live connection to the browser
    NotConnected = 9801,
    /// WebSocket or CDP protocol failure
    Transport = 9802,
    /// Request or connect timed out
    Timeout = 9803,
    /// Connection closed while a request was in flight
    ConnectionClosed = 9804,
    /// The encoder call itself threw in the remote context
    RemoteThrew = 9805,
    /// Wire Result with an unknown tag or a non-string value
    BadWireResult = 9806,
    /// Value type outside the encoder's type switch
    UnsupportedType = 9807,
    /// Could not find a debuggable tab
    Discovery = 9808,
    /// Invalid configuration
    Config = 9809,
}

/// Eval-in-browser errors
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("[{code}] Eval error: {message}")]
    Generic { code: u32, message: String },

    #[error("[{code}] Not connected: {message}")]
    NotConnected { code: u32, message: String },

    #[error("[{code}] Transport error: {message}")]
    Transport { code: u32, message: String },

    #[error("[{code}] Timeout: {message}")]
    Timeout { code: u32, message: String },

    #[error("[{code}] Connection closed: {message}")]
    ConnectionClosed { code: u32, message: String },

    #[error("[{code}] Encoder call threw: {message}")]
    RemoteThrew { code: u32, message: String },

    #[error("[{code}] Bad wire result: {message}")]
    BadWireResult { code: u32, message: String },

    #[error("[{code}] Unsupported result type: {message}")]
    UnsupportedType { code: u32, message: String },

    #[error("[{code}] Target discovery failed: {message}")]
    Discovery { code: u32, message: String },

    #[error("[{code}] Config error: {message}")]
    Config { code: u32, message: String },
}

impl EvalError {
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            code: EvalErrorCode::Generic as u32,
            message: message.into(),
        }
    }

    pub fn not_connected(message: impl Into<String>) -> Self {
        Self::NotConnected {
            code: EvalErrorCode::NotConnected as u32,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            code: EvalErrorCode::Transport as u32,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            code: EvalErrorCode::Timeout as u32,
            message: message.into(),
        }
    }

    pub fn connection_closed(message: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            code: EvalErrorCode::ConnectionClosed as u32,
            message: message.into(),
        }
    }

    pub fn remote_threw(message: impl Into<String>) -> Self {
        Self::RemoteThrew {
            code: EvalErrorCode::RemoteThrew as u32,
            message: message.into(),
        }
    }

    pub fn bad_wire_result(message: impl Into<String>) -> Self {
        Self::BadWireResult {
            code: EvalErrorCode::BadWireResult as u32,
            message: message.into(),
        }
    }

    pub fn unsupported_type(message: impl Into<String>) -> Self {
        Self::UnsupportedType {
            code: EvalErrorCode::UnsupportedType as u32,
            message: message.into(),
        }
    }

    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery {
            code: EvalErrorCode::Discovery as u32,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            code: EvalErrorCode::Config as u32,
            message: message.into(),
        }
    }

    /// Numeric error code
    pub fn code(&self) -> u32 {
        match self {
            Self::Generic { code, .. }
            | Self::NotConnected { code, .. }
            | Self::Transport { code, .. }
            | Self::Timeout { code, .. }
            | Self::ConnectionClosed { code, .. }
            | Self::RemoteThrew { code, .. }
            | Self::BadWireResult { code, .. }
            | Self::UnsupportedType { code, .. }
            | Self::Discovery { code, .. }
            | Self::Config { code, .. } => *code,
        }
    }
}

impl From<InspectorError> for EvalError {
    fn from(err: InspectorError) -> Self {
        match err {
            InspectorError::ConnectionFailed(msg) => Self::not_connected(msg),
            InspectorError::Timeout => Self::timeout("waiting for inspector response"),
            InspectorError::ConnectionClosed => Self::connection_closed("inspector socket closed"),
            other => Self::transport(other.to_string()),
        }
    }
}

// ============================================================================
// Extension Info
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ExtensionInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub wire_version: u32,
    pub status: &'static str,
}

pub fn extension_info() -> ExtensionInfo {
    ExtensionInfo {
        name: "ext_eval_in_browser",
        version: env!("CARGO_PKG_VERSION"),
        wire_version: WIRE_VERSION,
        status: "ready",
    }
}
