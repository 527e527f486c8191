//! Configuration parsing from eval-in-browser.toml
//!
//! Every field has a default, so an empty or missing file is valid.
//!
//! ```toml
//! [inspector]
//! port = 9222
//! target_url = "localhost:8080"
//!
//! [eval]
//! mode = "remote"
//! max_entries = 20
//!
//! [popup]
//! dwell_ms = 2000
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::encoder::DEFAULT_MAX_ENTRIES;
use crate::EvalError;

/// Default file name looked up next to the working directory
pub const CONFIG_FILE_NAME: &str = "eval-in-browser.toml";

/// Full configuration
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct EvalConfig {
    pub inspector: InspectorConfig,
    pub eval: EvalSettings,
    pub popup: PopupSettings,
    pub command: CommandSettings,
}

/// How to reach the browser
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InspectorConfig {
    pub host: String,
    pub port: u16,
    /// Overrides host/port: `ws://...`, `host:port` or a bare port
    pub endpoint: Option<String>,
    /// Substring the tab URL must contain
    pub target_url: Option<String>,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9222,
            endpoint: None,
            target_url: None,
            connect_timeout_ms: 5_000,
            request_timeout_ms: 30_000,
        }
    }
}

/// Where results get formatted
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EvalMode {
    /// Ship the encoder script; the tab returns a Wire Result
    #[default]
    Remote,
    /// Evaluate the raw text by value and format it locally
    Preview,
}

impl FromStr for EvalMode {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote" => Ok(EvalMode::Remote),
            "preview" => Ok(EvalMode::Preview),
            other => Err(EvalError::config(format!(
                "unknown eval mode: {other} (use remote or preview)"
            ))),
        }
    }
}

/// Evaluation behaviour
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EvalSettings {
    /// Language id the selection must have
    pub language: String,
    pub mode: EvalMode,
    /// Cap on previewed array elements / object keys
    pub max_entries: usize,
    /// Show a popup for `undefined` instead of suppressing it
    pub show_undefined: bool,
}

impl Default for EvalSettings {
    fn default() -> Self {
        Self {
            language: "javascript".to_string(),
            mode: EvalMode::Remote,
            max_entries: DEFAULT_MAX_ENTRIES,
            show_undefined: false,
        }
    }
}

/// Popup timing
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PopupSettings {
    pub dwell_ms: u64,
    pub fade_ms: u64,
}

impl Default for PopupSettings {
    fn default() -> Self {
        Self {
            dwell_ms: 2_000,
            fade_ms: 400,
        }
    }
}

impl PopupSettings {
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }

    pub fn fade(&self) -> Duration {
        Duration::from_millis(self.fade_ms)
    }
}

/// Command binding
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommandSettings {
    pub shortcut: String,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            shortcut: "Ctrl-J".to_string(),
        }
    }
}

impl EvalConfig {
    /// Parse configuration from file path
    pub fn from_file(path: &Path) -> Result<Self, EvalError> {
        let content = fs::read_to_string(path).map_err(|e| {
            EvalError::config(format!("Failed to read config at {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| EvalError::config(format!("{} ({})", e, path.display())))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, EvalError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| EvalError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else `eval-in-browser.toml` in `dir` if present,
    /// else defaults
    pub fn load_or_default(path: Option<&Path>, dir: &Path) -> Result<Self, EvalError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::from_file(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), EvalError> {
        if self.eval.max_entries == 0 {
            return Err(EvalError::config("eval.max_entries must be at least 1"));
        }
        if self.popup.dwell_ms == 0 {
            return Err(EvalError::config("popup.dwell_ms must be greater than 0"));
        }
        if self.eval.language.trim().is_empty() {
            return Err(EvalError::config("eval.language must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EvalConfig::from_toml_str("").unwrap();
        assert_eq!(config.inspector.port, 9222);
        assert_eq!(config.eval.language, "javascript");
        assert_eq!(config.eval.mode, EvalMode::Remote);
        assert_eq!(config.eval.max_entries, 20);
        assert!(!config.eval.show_undefined);
        assert_eq!(config.popup.dwell(), Duration::from_secs(2));
        assert_eq!(config.command.shortcut, "Ctrl-J");
    }

    #[test]
    fn test_partial_override() {
        let config = EvalConfig::from_toml_str(
            r#"
            [inspector]
            endpoint = "ws://127.0.0.1:9222/devtools/page/abc"

            [eval]
            mode = "preview"
            max_entries = 5

            [popup]
            fade_ms = 0
            "#,
        )
        .unwrap();
        assert_eq!(
            config.inspector.endpoint.as_deref(),
            Some("ws://127.0.0.1:9222/devtools/page/abc")
        );
        assert_eq!(config.inspector.host, "127.0.0.1");
        assert_eq!(config.eval.mode, EvalMode::Preview);
        assert_eq!(config.eval.max_entries, 5);
        assert_eq!(config.eval.language, "javascript");
        assert_eq!(config.popup.fade_ms, 0);
        assert_eq!(config.popup.dwell_ms, 2_000);
    }

    #[test]
    fn test_validation() {
        let err = EvalConfig::from_toml_str("[eval]\nmax_entries = 0").unwrap_err();
        assert!(err.to_string().contains("max_entries"));

        let err = EvalConfig::from_toml_str("[popup]\ndwell_ms = 0").unwrap_err();
        assert!(err.to_string().contains("dwell_ms"));

        let err = EvalConfig::from_toml_str("[eval]\nmode = \"sideways\"").unwrap_err();
        assert!(matches!(err, EvalError::Config { .. }));
    }

    #[test]
    fn test_mode_parses_like_the_config_file() {
        assert_eq!("remote".parse::<EvalMode>().unwrap(), EvalMode::Remote);
        assert_eq!("preview".parse::<EvalMode>().unwrap(), EvalMode::Preview);
        let err = "Preview".parse::<EvalMode>().unwrap_err();
        assert!(matches!(err, EvalError::Config { .. }));
        assert!(err.to_string().contains("Preview"));
    }

    #[test]
    fn test_load_or_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = EvalConfig::load_or_default(None, dir.path()).unwrap();
        assert_eq!(config.inspector.port, 9222);

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[inspector]\nport = 9333\n").unwrap();
        let config = EvalConfig::load_or_default(None, dir.path()).unwrap();
        assert_eq!(config.inspector.port, 9333);

        let missing = dir.path().join("missing.toml");
        assert!(EvalConfig::load_or_default(Some(&missing), dir.path()).is_err());
    }
}
