//! Annotation session
//!
//! One [`SessionController`] per open article drives selection, drafting,
//! saving and deleting, and owns the article's annotation list.

mod controller;
mod identity;

pub use controller::SessionController;
pub use identity::{Identity, ANONYMOUS_LABEL};

use std::time::Instant;

use serde::Serialize;

use crate::annotations::{Annotation, FractionalRect, HighlightColor};
use crate::overlay::AccentColor;

/// Where the session is in the selection → draft → save cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Drafting,
    Saving,
}

/// The annotation being composed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub page_number: u32,
    pub highlighted_text: String,
    pub comment_text: String,
    /// Empty for drafts opened without a selection
    pub regions: Vec<FractionalRect>,
}

/// Result of asking the session to pick up the current selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// A draft was opened (or replaced)
    Drafted,
    /// Nothing selected, or only whitespace
    Empty,
    /// The selection is not inside a rendered page
    GeometryUnavailable,
}

/// Comment brought into view by a click on its highlight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentFocus {
    pub annotation_id: String,
    /// End of the highlight ring around the comment
    pub pulse_until: Instant,
}

impl CommentFocus {
    pub fn is_pulsing(&self, now: Instant) -> bool {
        now < self.pulse_until
    }
}

/// Everything a UI needs to draw the session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub draft: Option<Draft>,
    /// Last validation or store message, shown inline
    pub message: Option<String>,
    pub focused_annotation: Option<String>,
    pub color: HighlightColor,
    /// Newest first
    pub annotations: Vec<CommentEntry>,
}

/// One row of the comment list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentEntry {
    #[serde(flatten)]
    pub annotation: Annotation,
    /// "You" for the reader's own comments
    pub author_label: String,
    /// Same for every comment by one author
    pub accent: AccentColor,
}
