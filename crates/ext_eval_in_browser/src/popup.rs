//! The result popup.
//!
//! One popup exists per [`Popup`]; its surface is created on first use and
//! reused afterwards. Every `show` replaces content and position, fast-forwards
//! a running fade and restarts the dwell timer:
//!
//! ```text
//!            show                dwell elapsed            fade elapsed
//!  Hidden ─────────► Visible ─────────────────► FadingOut ───────────► Hidden
//!                      ▲  │ show                    │ show
//!                      └──┘◄────────────────────────┘
//! ```
//!
//! The timer is owned by the popup: acquired on show, cancelled when replaced
//! or hidden. A generation number keeps a timer that lost the race for the
//! lock from touching a newer popup.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tracing::{debug, trace};

use crate::editor::{Coords, Editor, Position};
use crate::present::Presentation;

/// Host-supplied floating element
pub trait PopupSurface: Send {
    /// Replace the content
    fn set_content(&mut self, presentation: &Presentation);

    /// Make the element visible at full opacity
    fn show(&mut self);

    /// Place the element's top-left corner
    fn move_to(&mut self, left: f64, top: f64);

    /// Start fading out over `duration`
    fn begin_fade_out(&mut self, duration: Duration);

    /// Jump any running animation to its end state
    fn finish_animation(&mut self);

    /// Hide immediately
    fn hide(&mut self);
}

/// Creates the surface on first display
pub type SurfaceFactory = Arc<dyn Fn() -> Box<dyn PopupSurface> + Send + Sync>;

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PopupState {
    Hidden,
    Visible,
    FadingOut,
}

/// Timing of the popup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupTiming {
    pub dwell: Duration,
    pub fade: Duration,
}

impl Default for PopupTiming {
    fn default() -> Self {
        Self {
            dwell: Duration::from_millis(2_000),
            fade: Duration::from_millis(400),
        }
    }
}

/// Pending hide, cancelled by dropping or signalling the sender
struct PendingHide {
    cancel_tx: mpsc::Sender<()>,
}

struct PopupInner {
    surface: Option<Box<dyn PopupSurface>>,
    state: PopupState,
    generation: u64,
    pending_hide: Option<PendingHide>,
}

impl PopupInner {
    fn cancel_pending_hide(&mut self) {
        if let Some(pending) = self.pending_hide.take() {
            let _ = pending.cancel_tx.try_send(());
        }
    }
}

/// The single reusable result popup
#[derive(Clone)]
pub struct Popup {
    inner: Arc<Mutex<PopupInner>>,
    factory: SurfaceFactory,
    timing: PopupTiming,
}

impl Popup {
    pub fn new(timing: PopupTiming, factory: SurfaceFactory) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PopupInner {
                surface: None,
                state: PopupState::Hidden,
                generation: 0,
                pending_hide: None,
            })),
            factory,
            timing,
        }
    }

    /// Show `presentation` under the editor's selection and restart the dwell
    pub async fn show(&self, presentation: &Presentation, editor: &dyn Editor) {
        let anchor = anchor_coords(editor);

        let mut inner = self.inner.lock().await;
        inner.cancel_pending_hide();

        let previous = inner.state;
        let surface = inner.surface.get_or_insert_with(|| {
            debug!("Creating result popup");
            (self.factory)()
        });

        if previous == PopupState::FadingOut {
            surface.finish_animation();
        }
        surface.set_content(presentation);
        surface.show();
        surface.move_to(anchor.left, anchor.bottom);

        inner.state = PopupState::Visible;
        inner.generation += 1;
        let generation = inner.generation;

        let (cancel_tx, cancel_rx) = mpsc::channel::<()>(1);
        inner.pending_hide = Some(PendingHide { cancel_tx });
        drop(inner);

        trace!(
            generation = generation,
            left = anchor.left,
            top = anchor.bottom,
            "popup.show"
        );

        let popup = self.clone();
        tokio::spawn(async move {
            popup.run_dwell(generation, cancel_rx).await;
        });
    }

    /// Hide now, cancelling any pending timer
    pub async fn hide(&self) {
        let mut inner = self.inner.lock().await;
        inner.cancel_pending_hide();
        if inner.state != PopupState::Hidden {
            if let Some(surface) = inner.surface.as_mut() {
                surface.finish_animation();
                surface.hide();
            }
            inner.state = PopupState::Hidden;
            debug!("popup.hide");
        }
    }

    pub async fn state(&self) -> PopupState {
        self.inner.lock().await.state
    }

    async fn run_dwell(&self, generation: u64, mut cancel_rx: mpsc::Receiver<()>) {
        tokio::select! {
            _ = sleep(self.timing.dwell) => {}
            _ = cancel_rx.recv() => {
                trace!(generation = generation, "popup dwell cancelled");
                return;
            }
        }

        {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation || inner.state != PopupState::Visible {
                return;
            }
            inner.state = PopupState::FadingOut;
            if let Some(surface) = inner.surface.as_mut() {
                surface.begin_fade_out(self.timing.fade);
            }
            debug!(generation = generation, "popup.fade_out");
        }

        tokio::select! {
            _ = sleep(self.timing.fade) => {}
            _ = cancel_rx.recv() => {
                trace!(generation = generation, "popup fade interrupted");
                return;
            }
        }

        let mut inner = self.inner.lock().await;
        if inner.generation != generation || inner.state != PopupState::FadingOut {
            return;
        }
        if let Some(surface) = inner.surface.as_mut() {
            surface.hide();
        }
        inner.state = PopupState::Hidden;
        inner.pending_hide = None;
        debug!(generation = generation, "popup hidden");
    }
}

/// Where the popup anchors.
///
/// Single-line selections anchor at the selection's start column. A
/// multi-line selection anchors on its last line, at the first
/// non-whitespace character (column 0 when there is none).
pub fn anchor_position(editor: &dyn Editor) -> Position {
    let selection = editor.selection();
    let line = selection.end.line;
    if !selection.is_multiline() {
        return Position::new(line, selection.start.ch);
    }

    let ch = editor
        .line(line)
        .and_then(|text| text.chars().position(|c| !c.is_whitespace()))
        .unwrap_or(0);
    Position::new(line, ch)
}

/// Screen coordinates of the anchor character
pub fn anchor_coords(editor: &dyn Editor) -> Coords {
    Coords::from(editor.char_coords(anchor_position(editor)))
}
