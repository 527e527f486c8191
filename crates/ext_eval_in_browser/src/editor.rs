//! Host editor seams.
//!
//! The extension never owns an editor. The host implements [`EditorHost`] and
//! [`Editor`]; [`BufferEditor`] is a plain in-memory implementation used by
//! the terminal host and tests.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Line/column position, both zero-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub ch: usize,
}

impl Position {
    pub fn new(line: usize, ch: usize) -> Self {
        Self { line, ch }
    }
}

/// Current selection; `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selection {
    pub start: Position,
    pub end: Position,
}

impl Selection {
    pub fn is_multiline(&self) -> bool {
        self.start.line != self.end.line
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Screen coordinates as the host's mapping API reports them.
///
/// Older editors answer `{x, y, ybot}`, newer ones `{left, top, bottom}`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawCoords {
    Edges { left: f64, top: f64, bottom: f64 },
    Legacy { x: f64, y: f64, ybot: f64 },
}

/// Normalized screen coordinates of a character cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coords {
    pub left: f64,
    pub top: f64,
    pub bottom: f64,
}

impl From<RawCoords> for Coords {
    fn from(raw: RawCoords) -> Self {
        match raw {
            RawCoords::Edges { left, top, bottom } => Coords { left, top, bottom },
            RawCoords::Legacy { x, y, ybot } => Coords {
                left: x,
                top: y,
                bottom: ybot,
            },
        }
    }
}

/// Live-development session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LiveStatus {
    Error,
    Inactive,
    Connecting,
    LoadingAgents,
    Active,
    OutOfSync,
    SyncError,
}

impl LiveStatus {
    /// Evaluation is only attempted on a live, connected session
    pub fn allows_eval(&self) -> bool {
        matches!(self, LiveStatus::Active | LiveStatus::OutOfSync)
    }
}

/// A text editor as the host exposes it
pub trait Editor: Send + Sync {
    fn selection(&self) -> Selection;

    fn selected_text(&self) -> String;

    /// Language id at the selection (e.g. `"javascript"`)
    fn language_for_selection(&self) -> String;

    /// Full text of line `index`
    fn line(&self, index: usize) -> Option<String>;

    /// Map a position to screen pixels
    fn char_coords(&self, pos: Position) -> RawCoords;
}

/// The application hosting editors and the live session
pub trait EditorHost: Send + Sync {
    fn focused_editor(&self) -> Option<Arc<dyn Editor>>;

    fn live_status(&self) -> LiveStatus;
}

/// In-memory editor over a text buffer with a fixed character grid
#[derive(Debug, Clone)]
pub struct BufferEditor {
    lines: Vec<String>,
    selection: Selection,
    language: String,
    char_width: f64,
    line_height: f64,
}

impl BufferEditor {
    /// Buffer whose selection spans all of `text`
    pub fn new(text: &str, language: impl Into<String>) -> Self {
        let lines: Vec<String> = text.split('\n').map(str::to_string).collect();
        let last = lines.len() - 1;
        let end = Position::new(last, lines[last].chars().count());
        Self {
            lines,
            selection: Selection {
                start: Position::default(),
                end,
            },
            language: language.into(),
            char_width: 1.0,
            line_height: 1.0,
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// Pixel size of one character cell
    pub fn with_metrics(mut self, char_width: f64, line_height: f64) -> Self {
        self.char_width = char_width;
        self.line_height = line_height;
        self
    }
}

impl Editor for BufferEditor {
    fn selection(&self) -> Selection {
        self.selection
    }

    fn selected_text(&self) -> String {
        let Selection { start, end } = self.selection;
        let mut out = String::new();
        for line_no in start.line..=end.line.min(self.lines.len().saturating_sub(1)) {
            let line = &self.lines[line_no];
            let from = if line_no == start.line { start.ch } else { 0 };
            let to = if line_no == end.line {
                end.ch
            } else {
                line.chars().count()
            };
            if line_no != start.line {
                out.push('\n');
            }
            out.extend(line.chars().skip(from).take(to.saturating_sub(from)));
        }
        out
    }

    fn language_for_selection(&self) -> String {
        self.language.clone()
    }

    fn line(&self, index: usize) -> Option<String> {
        self.lines.get(index).cloned()
    }

    fn char_coords(&self, pos: Position) -> RawCoords {
        let top = pos.line as f64 * self.line_height;
        RawCoords::Edges {
            left: pos.ch as f64 * self.char_width,
            top,
            bottom: top + self.line_height,
        }
    }
}
