//! Click versus drag on highlight boxes
//!
//! Highlights sit on top of the selectable text, so a press that starts on a
//! highlight may be the beginning of a new selection. Short presses are
//! clicks; anything longer is treated as a drag and left alone.

use std::time::{Duration, Instant};

/// Presses shorter than this are clicks. Heuristic; override per session.
pub const CLICK_THRESHOLD: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerGesture {
    /// Quick press and release on the annotation with this id
    Click(String),
    /// Press held past the threshold
    Drag,
    /// Release without a press on a highlight
    Miss,
}

#[derive(Debug)]
pub struct PointerTracker {
    threshold: Duration,
    pressed: Option<(Instant, Option<String>)>,
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self::new(CLICK_THRESHOLD)
    }
}

impl PointerTracker {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            pressed: None,
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// `target` is the annotation under the pointer, if any
    pub fn pointer_down(&mut self, target: Option<String>, at: Instant) {
        self.pressed = Some((at, target));
    }

    pub fn pointer_up(&mut self, at: Instant) -> PointerGesture {
        let Some((pressed_at, target)) = self.pressed.take() else {
            return PointerGesture::Miss;
        };

        if at.saturating_duration_since(pressed_at) >= self.threshold {
            return PointerGesture::Drag;
        }

        match target {
            Some(id) => PointerGesture::Click(id),
            None => PointerGesture::Miss,
        }
    }
}
