//! The "Evaluate JS in Browser" command.
//!
//! [`EvalCommand::handle`] is what the menu entry and shortcut invoke. It is
//! inert unless the live session is up, an editor has focus and the selection
//! is JavaScript; otherwise it dispatches one evaluation and returns at once.
//!
//! Evaluations may overlap. Each completes independently and shows its own
//! result; the popup is a singleton, so whichever completes last is what the
//! user sees.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use crate::channel::{EvalChannel, EvalRequest, OBJECT_GROUP};
use crate::config::{EvalConfig, EvalMode, EvalSettings};
use crate::editor::{Editor, EditorHost};
use crate::encoder::{build_expression, encode_exception};
use crate::popup::{Popup, PopupTiming, SurfaceFactory};
use crate::present::{Presentation, Presenter};
use crate::preview::preview;
use crate::wire::{WireResult, WIRE_VERSION};
use crate::EvalError;

/// Command id
pub const CMD_EVAL: &str = "evalinbrowser.evaluate";

/// Menu label
pub const CMD_EVAL_LABEL: &str = "Evaluate JS in Browser";

// ============================================================================
// Registration
// ============================================================================

/// Where a command appears in the menus
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuPlacement {
    pub menu: String,
    pub section: String,
}

/// Describes a command to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    /// Accelerator, e.g. `"Ctrl-J"`
    pub shortcut: Option<String>,
    pub menu: Option<MenuPlacement>,
}

pub type CommandHandler = Arc<dyn Fn() + Send + Sync>;

/// The host's command and menu surface
pub trait CommandRegistry {
    fn register(&mut self, spec: CommandSpec, handler: CommandHandler) -> Result<(), EvalError>;
}

/// Register the eval command with the host
pub fn register_commands(
    registry: &mut dyn CommandRegistry,
    command: Arc<EvalCommand>,
    shortcut: &str,
) -> Result<(), EvalError> {
    let spec = CommandSpec {
        id: CMD_EVAL.to_string(),
        label: CMD_EVAL_LABEL.to_string(),
        shortcut: Some(shortcut.to_string()),
        menu: Some(MenuPlacement {
            menu: "file".to_string(),
            section: "live".to_string(),
        }),
    };
    debug!(id = CMD_EVAL, shortcut = %shortcut, "Registering command");

    registry.register(
        spec,
        Arc::new(move || {
            command.handle();
        }),
    )
}

/// Simple in-process command table
#[derive(Default)]
pub struct CommandTable {
    commands: HashMap<String, (CommandSpec, CommandHandler)>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a command by id; false when unknown
    pub fn execute(&self, id: &str) -> bool {
        match self.commands.get(id) {
            Some((_, handler)) => {
                handler();
                true
            }
            None => false,
        }
    }

    pub fn spec(&self, id: &str) -> Option<&CommandSpec> {
        self.commands.get(id).map(|(spec, _)| spec)
    }

    /// Find the command bound to a shortcut
    pub fn by_shortcut(&self, shortcut: &str) -> Option<&CommandSpec> {
        self.commands
            .values()
            .map(|(spec, _)| spec)
            .find(|spec| spec.shortcut.as_deref() == Some(shortcut))
    }
}

impl CommandRegistry for CommandTable {
    fn register(&mut self, spec: CommandSpec, handler: CommandHandler) -> Result<(), EvalError> {
        if self.commands.contains_key(&spec.id) {
            return Err(EvalError::generic(format!(
                "command already registered: {}",
                spec.id
            )));
        }
        self.commands.insert(spec.id.clone(), (spec, handler));
        Ok(())
    }
}

// ============================================================================
// Eval command
// ============================================================================

/// Evaluates the focused editor's selection in the browser
pub struct EvalCommand {
    host: Arc<dyn EditorHost>,
    channel: Arc<dyn EvalChannel>,
    presenter: Presenter,
    popup: Popup,
    settings: EvalSettings,
    dispatched: AtomicU64,
    completed: AtomicU64,
}

impl EvalCommand {
    pub fn new(
        config: &EvalConfig,
        host: Arc<dyn EditorHost>,
        channel: Arc<dyn EvalChannel>,
        surface: SurfaceFactory,
    ) -> Self {
        let timing = PopupTiming {
            dwell: config.popup.dwell(),
            fade: config.popup.fade(),
        };
        Self {
            host,
            channel,
            presenter: Presenter::new(config.eval.show_undefined),
            popup: Popup::new(timing, surface),
            settings: config.eval.clone(),
            dispatched: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        }
    }

    pub fn popup(&self) -> &Popup {
        &self.popup
    }

    /// Menu/shortcut entry point.
    ///
    /// Returns the spawned evaluation, or `None` when the command was inert.
    pub fn handle(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let status = self.host.live_status();
        if !status.allows_eval() {
            debug!(status = ?status, "Live session not active, ignoring eval");
            return None;
        }

        let editor = self.host.focused_editor()?;

        let language = editor.language_for_selection();
        if language != self.settings.language {
            debug!(language = %language, "Selection is not {}", self.settings.language);
            return None;
        }

        let text = editor.selected_text();
        if text.trim().is_empty() {
            debug!("Empty selection, nothing to evaluate");
            return None;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("INTERNAL ERROR: no async runtime to dispatch eval: {}", e);
                return None;
            }
        };

        let command = Arc::clone(self);
        Some(runtime.spawn(async move {
            command.run(&text, editor).await;
        }))
    }

    /// Evaluate `text` and decode the result.
    ///
    /// `Ok(None)` when there is nothing to show.
    pub async fn evaluate(&self, text: &str) -> Result<Option<Presentation>, EvalError> {
        if !self.channel.is_connected() {
            return Err(EvalError::not_connected("evaluation channel is closed"));
        }

        match self.settings.mode {
            EvalMode::Remote => self.evaluate_remote(text).await,
            EvalMode::Preview => self.evaluate_preview(text).await,
        }
    }

    async fn evaluate_remote(&self, text: &str) -> Result<Option<Presentation>, EvalError> {
        let expression = build_expression(text, self.settings.max_entries);
        trace!(wire_version = WIRE_VERSION, expression = %expression, "To eval");

        let response = self.channel.evaluate(EvalRequest::by_value(expression)).await?;
        if response.threw() {
            return Err(EvalError::remote_threw(response.exception_text()));
        }

        let raw = response.result.as_str().ok_or_else(|| {
            EvalError::bad_wire_result(format!(
                "encoder returned {} instead of a string",
                response.result.kind
            ))
        })?;
        trace!(result = %raw, "Wire result");

        self.presenter.decode(raw)
    }

    async fn evaluate_preview(&self, text: &str) -> Result<Option<Presentation>, EvalError> {
        let response = self.channel.evaluate(EvalRequest::by_reference(text)).await?;

        let wire = match &response.exception_details {
            Some(details) => Ok(encode_exception(details)),
            None if response.was_thrown => Ok(WireResult::Exception(response.exception_text())),
            None => {
                preview(
                    self.channel.as_ref(),
                    &response.result,
                    self.settings.max_entries,
                )
                .await
            }
        };
        if let Err(e) = self.channel.release_object_group(OBJECT_GROUP).await {
            debug!("Failed to release preview objects: {}", e);
        }

        let wire = wire?;
        trace!(result = %wire, "Locally encoded result");

        Ok(self.presenter.present(&wire))
    }

    async fn run(&self, text: &str, editor: Arc<dyn Editor>) {
        let seq = self.dispatched.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(seq = seq, len = text.len(), "Dispatching eval");

        match self.evaluate(text).await {
            Ok(Some(presentation)) => {
                let order = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(seq = seq, completed = order, "Showing eval result");
                self.popup.show(&presentation, editor.as_ref()).await;
            }
            Ok(None) => {
                debug!(seq = seq, "Eval produced no result to display");
            }
            Err(e) => {
                error!(seq = seq, code = e.code(), "INTERNAL ERROR: {}", e);
            }
        }
    }
}
