//! Overlay rendering
//!
//! Turns stored fractional regions back into device boxes for the page's
//! current rendered size. Zoom changes therefore never touch stored data;
//! they only trigger a redraw.

mod attribution;
mod pointer;

pub use attribution::{
    author_accent, author_color_index, author_label, AccentColor, AUTHOR_ACCENTS,
};
pub use pointer::{PointerGesture, PointerTracker, CLICK_THRESHOLD};

use std::collections::HashMap;

use crate::annotations::{AnnotationList, Rgba};
use crate::geometry::{to_device, DeviceRect, PageSize};

/// Tooltip for highlights without a comment
const DEFAULT_TITLE: &str = "Click to see comment";

/// One painted, hit-testable highlight box
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayBox {
    pub annotation_id: String,
    /// Index into the annotation's regions
    pub region_index: usize,
    /// Device pixels relative to the page container
    pub rect: DeviceRect,
    pub fill: Rgba,
    pub title: String,
}

/// Everything drawn on one page
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLayer {
    pub page: u32,
    pub size: PageSize,
    pub boxes: Vec<OverlayBox>,
}

/// Compute the boxes for `page` at `size`
pub fn overlay_boxes(page: u32, size: PageSize, annotations: &AnnotationList) -> Vec<OverlayBox> {
    annotations
        .on_page(page)
        .flat_map(|annotation| {
            let title = if annotation.has_comment() {
                annotation.comment_text.clone()
            } else {
                DEFAULT_TITLE.to_string()
            };
            let fill = annotation.color.fill();

            annotation
                .highlight_regions
                .iter()
                .enumerate()
                .map(move |(region_index, region)| OverlayBox {
                    annotation_id: annotation.id.clone(),
                    region_index,
                    rect: to_device(region, size),
                    fill,
                    title: title.clone(),
                })
        })
        .collect()
}

/// Retained overlay layers, one per page
///
/// Rendering a page replaces its previous layer, so repeated renders never
/// accumulate boxes.
#[derive(Debug, Default)]
pub struct OverlayRenderer {
    layers: HashMap<u32, OverlayLayer>,
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Redraw `page`; the list is only borrowed for the duration of the call
    pub fn render(&mut self, page: u32, size: PageSize, annotations: &AnnotationList) -> &OverlayLayer {
        let boxes = overlay_boxes(page, size, annotations);
        tracing::debug!(page, boxes = boxes.len(), width = size.width, "Rendered overlay");

        self.layers.insert(page, OverlayLayer { page, size, boxes });
        &self.layers[&page]
    }

    pub fn layer(&self, page: u32) -> Option<&OverlayLayer> {
        self.layers.get(&page)
    }

    /// Topmost box under a point in page-container pixels
    pub fn hit_test(&self, page: u32, x: f64, y: f64) -> Option<&OverlayBox> {
        self.layers
            .get(&page)?
            .boxes
            .iter()
            .rev()
            .find(|b| b.rect.contains(x, y))
    }

    pub fn clear_page(&mut self, page: u32) {
        self.layers.remove(&page);
    }

    pub fn clear(&mut self) {
        self.layers.clear();
    }
}
