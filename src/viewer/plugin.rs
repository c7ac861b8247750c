//! Viewer-plugin backend
//!
//! A continuous-scroll viewer renders every page into its own inner-page
//! element and lets a highlight plugin draw into a per-page layer. The host
//! reports element rectangles after each layout pass.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::watch;

use super::{CapturedSelection, RenderingSurface, ViewState};
use crate::geometry::ClientRect;
use crate::overlay::OverlayBox;

/// Plugin-based viewer state
pub struct PluginSurface {
    state: Mutex<PluginState>,
    view_tx: watch::Sender<ViewState>,
}

#[derive(Default)]
struct PluginState {
    /// Client rect of each inner-page element, index 0 = page 1
    page_rects: Vec<ClientRect>,
    selection: Option<(String, Vec<ClientRect>)>,
    layers: HashMap<u32, Vec<OverlayBox>>,
}

impl Default for PluginSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginSurface {
    pub fn new() -> Self {
        let (view_tx, _) = watch::channel(ViewState::default());
        Self {
            state: Mutex::new(PluginState::default()),
            view_tx,
        }
    }

    /// Record a layout pass (initial render, zoom, scroll).
    ///
    /// Scroll-only passes keep the scale; subscribers hear about scale
    /// changes only.
    pub fn update_layout(&self, page_rects: Vec<ClientRect>, scale: f64) {
        let page_count = page_rects.len() as u32;
        {
            let mut state = self.state.lock();
            state.page_rects = page_rects;
            state.layers.retain(|page, _| *page <= page_count);
        }

        self.view_tx.send_if_modified(|view| {
            let mut changed = false;
            if (view.scale - scale).abs() > f64::EPSILON {
                view.scale = scale;
                changed = true;
            }
            if page_count > 0 && view.page > page_count {
                view.page = page_count;
                changed = true;
            }
            changed
        });
    }

    /// The viewer reports which page is mostly in view
    pub fn set_current_page(&self, page: u32) {
        self.view_tx.send_if_modified(|view| {
            if view.page == page {
                return false;
            }
            view.page = page;
            true
        });
    }

    /// Page whose element contains the client point
    pub fn page_at(&self, x: f64, y: f64) -> Option<u32> {
        let state = self.state.lock();
        page_containing(&state.page_rects, x, y)
    }

    pub fn set_selection(&self, text: impl Into<String>, rects: Vec<ClientRect>) {
        self.state.lock().selection = Some((text.into(), rects));
    }

    pub fn clear_selection(&self) {
        self.state.lock().selection = None;
    }

    /// Highlight layer drawn for `page`
    pub fn layer(&self, page: u32) -> Vec<OverlayBox> {
        self.state.lock().layers.get(&page).cloned().unwrap_or_default()
    }
}

fn page_containing(page_rects: &[ClientRect], x: f64, y: f64) -> Option<u32> {
    page_rects
        .iter()
        .position(|rect| rect.contains(x, y))
        .map(|index| index as u32 + 1)
}

impl RenderingSurface for PluginSurface {
    fn page_container_rect(&self, page: u32) -> Option<ClientRect> {
        let index = (page as usize).checked_sub(1)?;
        self.state.lock().page_rects.get(index).copied()
    }

    fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.view_tx.subscribe()
    }

    fn view(&self) -> ViewState {
        *self.view_tx.borrow()
    }

    fn rendered_pages(&self) -> Vec<u32> {
        (1..=self.state.lock().page_rects.len() as u32).collect()
    }

    fn capture_selection(&self) -> Option<CapturedSelection> {
        let state = self.state.lock();
        let (text, rects) = state.selection.as_ref()?;

        // the page holding the selection's first line owns the whole selection
        let page_number = rects.first().and_then(|first| {
            let (x, y) = first.center();
            page_containing(&state.page_rects, x, y)
        });

        Some(CapturedSelection {
            page_number,
            text: text.clone(),
            rects: rects.clone(),
        })
    }

    fn paint_overlay(&self, page: u32, boxes: &[OverlayBox]) {
        self.state.lock().layers.insert(page, boxes.to_vec());
    }
}
