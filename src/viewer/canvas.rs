//! Canvas backend
//!
//! One page at a time is rasterized into a canvas; a text layer on top
//! makes it selectable and highlights are filled straight onto the canvas.
//! The page element is the canvas itself, so its rect is the canvas origin
//! plus the page size at the current scale.

use parking_lot::Mutex;
use tokio::sync::watch;

use super::text_layer::{layout_text_layer, TextContentItem, TextSpan};
use super::{CapturedSelection, RenderingSurface, ViewState};
use crate::geometry::{ClientRect, PageSize};
use crate::overlay::OverlayBox;

pub const MIN_SCALE: f64 = 0.5;
pub const MAX_SCALE: f64 = 3.0;
pub const SCALE_STEP: f64 = 0.25;

/// Canvas-based viewer state
pub struct CanvasSurface {
    state: Mutex<CanvasState>,
    view_tx: watch::Sender<ViewState>,
}

struct CanvasState {
    /// Page sizes at scale 1.0, index 0 = page 1
    page_sizes: Vec<PageSize>,
    /// Client position of the canvas element
    origin: (f64, f64),
    selection: Option<(String, Vec<ClientRect>)>,
    text_layer: Vec<TextSpan>,
    highlights: Vec<OverlayBox>,
}

impl CanvasSurface {
    /// Open a document whose pages measure `page_sizes` at scale 1.0
    pub fn new(page_sizes: Vec<PageSize>) -> Self {
        let (view_tx, _) = watch::channel(ViewState::default());
        Self {
            state: Mutex::new(CanvasState {
                page_sizes,
                origin: (0.0, 0.0),
                selection: None,
                text_layer: Vec::new(),
                highlights: Vec::new(),
            }),
            view_tx,
        }
    }

    pub fn page_count(&self) -> u32 {
        self.state.lock().page_sizes.len() as u32
    }

    /// The canvas moved (scroll or layout)
    pub fn set_origin(&self, left: f64, top: f64) {
        self.state.lock().origin = (left, top);
    }

    /// Show `page`; out-of-range pages are ignored
    pub fn go_to_page(&self, page: u32) -> bool {
        if page < 1 || page > self.page_count() {
            return false;
        }

        let changed = self.view_tx.send_if_modified(|view| {
            if view.page == page {
                return false;
            }
            view.page = page;
            true
        });

        if changed {
            self.repaint();
            tracing::debug!(page, "Canvas page changed");
        }
        true
    }

    /// Move by `offset` pages (Previous/Next buttons)
    pub fn change_page(&self, offset: i32) -> bool {
        let target = self.view().page as i64 + offset as i64;
        u32::try_from(target).map(|p| self.go_to_page(p)).unwrap_or(false)
    }

    /// Set the zoom, clamped to the supported range; returns the applied scale
    pub fn set_scale(&self, scale: f64) -> f64 {
        let scale = scale.clamp(MIN_SCALE, MAX_SCALE);

        let changed = self.view_tx.send_if_modified(|view| {
            if (view.scale - scale).abs() < f64::EPSILON {
                return false;
            }
            view.scale = scale;
            true
        });

        if changed {
            self.repaint();
            tracing::debug!(scale, "Canvas zoom changed");
        }
        scale
    }

    pub fn zoom_in(&self) -> f64 {
        self.set_scale(self.view().scale + SCALE_STEP)
    }

    pub fn zoom_out(&self) -> f64 {
        self.set_scale(self.view().scale - SCALE_STEP)
    }

    /// Canvas dimensions for the current page and zoom
    pub fn canvas_size(&self) -> Option<PageSize> {
        let view = self.view();
        let state = self.state.lock();
        state.base_size(view.page).map(|size| size.scaled(view.scale))
    }

    /// Record the selection made in the text layer
    pub fn set_selection(&self, text: impl Into<String>, rects: Vec<ClientRect>) {
        self.state.lock().selection = Some((text.into(), rects));
    }

    pub fn clear_selection(&self) {
        self.state.lock().selection = None;
    }

    /// Lay out the current page's text content; returns the number of spans
    pub fn load_text_content(&self, items: &[TextContentItem]) -> usize {
        let view = self.view();
        let mut state = self.state.lock();
        let Some(base) = state.base_size(view.page) else {
            return 0;
        };
        state.text_layer = layout_text_layer(items, base, view.scale);
        state.text_layer.len()
    }

    pub fn text_layer(&self) -> Vec<TextSpan> {
        self.state.lock().text_layer.clone()
    }

    /// Highlight rectangles currently filled onto the canvas
    pub fn highlights(&self) -> Vec<OverlayBox> {
        self.state.lock().highlights.clone()
    }

    /// A fresh raster wipes highlights, text layer and selection
    fn repaint(&self) {
        let mut state = self.state.lock();
        state.highlights.clear();
        state.text_layer.clear();
        state.selection = None;
    }
}

impl CanvasState {
    fn base_size(&self, page: u32) -> Option<PageSize> {
        let index = (page as usize).checked_sub(1)?;
        self.page_sizes.get(index).copied()
    }
}

impl RenderingSurface for CanvasSurface {
    fn page_container_rect(&self, page: u32) -> Option<ClientRect> {
        let view = self.view();
        if page != view.page {
            return None;
        }

        let state = self.state.lock();
        let size = state.base_size(page)?.scaled(view.scale);
        Some(ClientRect::new(state.origin.0, state.origin.1, size.width, size.height))
    }

    fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.view_tx.subscribe()
    }

    fn view(&self) -> ViewState {
        *self.view_tx.borrow()
    }

    fn capture_selection(&self) -> Option<CapturedSelection> {
        let page = self.view().page;
        let state = self.state.lock();
        let (text, rects) = state.selection.as_ref()?;

        Some(CapturedSelection {
            page_number: Some(page),
            text: text.clone(),
            rects: rects.clone(),
        })
    }

    fn paint_overlay(&self, page: u32, boxes: &[OverlayBox]) {
        if page != self.view().page {
            return;
        }
        self.state.lock().highlights = boxes.to_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter_pages(count: usize) -> CanvasSurface {
        CanvasSurface::new(vec![PageSize::new(612.0, 792.0); count])
    }

    #[test]
    fn test_container_rect_follows_zoom() {
        let canvas = letter_pages(3);
        canvas.set_origin(100.0, 50.0);

        let rect = canvas.page_container_rect(1).unwrap();
        assert_eq!(rect, ClientRect::new(100.0, 50.0, 918.0, 1188.0));

        canvas.set_scale(1.0);
        let rect = canvas.page_container_rect(1).unwrap();
        assert_eq!(rect.width, 612.0);

        // only the visible page has an element
        assert!(canvas.page_container_rect(2).is_none());
    }

    #[test]
    fn test_zoom_is_clamped() {
        let canvas = letter_pages(1);
        for _ in 0..10 {
            canvas.zoom_in();
        }
        assert_eq!(canvas.view().scale, MAX_SCALE);
        for _ in 0..20 {
            canvas.zoom_out();
        }
        assert_eq!(canvas.view().scale, MIN_SCALE);
    }

    #[test]
    fn test_page_navigation_bounds() {
        let canvas = letter_pages(2);
        assert!(!canvas.change_page(-1));
        assert!(canvas.change_page(1));
        assert_eq!(canvas.view().page, 2);
        assert!(!canvas.change_page(1));
        assert!(!canvas.go_to_page(0));
    }

    #[tokio::test]
    async fn test_subscribers_see_page_and_zoom_changes() {
        let canvas = letter_pages(4);
        let mut rx = canvas.subscribe();

        canvas.go_to_page(3);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().page, 3);

        canvas.zoom_in();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().scale, 1.75);

        // no-op changes do not notify
        canvas.go_to_page(3);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_page_change_clears_selection_and_text_layer() {
        let canvas = letter_pages(2);
        canvas.set_selection("words", vec![ClientRect::new(1.0, 1.0, 10.0, 10.0)]);
        let items = vec![TextContentItem {
            text: "words".to_string(),
            transform: [10.0, 0.0, 0.0, 10.0, 72.0, 700.0],
            font_name: String::new(),
        }];
        assert_eq!(canvas.load_text_content(&items), 1);

        canvas.go_to_page(2);
        assert!(canvas.capture_selection().is_none());
        assert!(canvas.text_layer().is_empty());
    }

    #[test]
    fn test_capture_reports_visible_page() {
        let canvas = letter_pages(2);
        canvas.go_to_page(2);
        canvas.set_selection("Attention", vec![ClientRect::new(1.0, 1.0, 10.0, 10.0)]);

        let captured = canvas.capture_selection().unwrap();
        assert_eq!(captured.page_number, Some(2));
        assert_eq!(captured.text, "Attention");
    }
}
