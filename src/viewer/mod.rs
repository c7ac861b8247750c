//! Rendering surfaces
//!
//! The engine never talks to a concrete PDF viewer. Both integrations (a
//! canvas with a text layer, and a continuous viewer with a highlight
//! plugin) sit behind [`RenderingSurface`].

mod canvas;
mod plugin;
mod text_layer;

pub use canvas::{CanvasSurface, MAX_SCALE, MIN_SCALE, SCALE_STEP};
pub use plugin::PluginSurface;
pub use text_layer::{layout_text_layer, TextContentItem, TextSpan};

use tokio::sync::watch;

use crate::geometry::ClientRect;
use crate::overlay::OverlayBox;

/// Scale used when a viewer first opens a document
pub const DEFAULT_SCALE: f64 = 1.5;

/// What the reader is looking at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    /// 1-based page number
    pub page: u32,
    /// Zoom factor (1.0 = 72 DPI)
    pub scale: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            page: 1,
            scale: DEFAULT_SCALE,
        }
    }
}

/// Native selection as reported by the viewer
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedSelection {
    /// Page whose container holds the selection; `None` when it lies
    /// outside every page (toolbar, side panel)
    pub page_number: Option<u32>,
    pub text: String,
    /// One rectangle per visual line, in selection order
    pub rects: Vec<ClientRect>,
}

/// A PDF viewer integration
pub trait RenderingSurface: Send + Sync {
    /// Bounding rectangle of the page element at the current zoom, if rendered
    fn page_container_rect(&self, page: u32) -> Option<ClientRect>;

    /// Page/zoom change notifications
    fn subscribe(&self) -> watch::Receiver<ViewState>;

    /// Current page and zoom
    fn view(&self) -> ViewState;

    /// Pages whose elements currently exist and carry an overlay layer
    fn rendered_pages(&self) -> Vec<u32> {
        vec![self.view().page]
    }

    /// The active text selection, if any
    fn capture_selection(&self) -> Option<CapturedSelection>;

    /// Replace the overlay drawn on `page`
    fn paint_overlay(&self, page: u32, boxes: &[OverlayBox]);
}
