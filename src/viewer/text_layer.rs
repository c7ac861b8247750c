//! Text layer for canvas rendering
//!
//! The canvas backend paints page pixels itself, so selectable text comes
//! from a separate layer of near-transparent spans positioned from the text
//! content stream.

use serde::{Deserialize, Serialize};

use crate::geometry::PageSize;

/// One run of text from the page's text content stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContentItem {
    #[serde(rename = "str")]
    pub text: String,
    /// Glyph matrix `[a, b, c, d, e, f]` in PDF user space (y up)
    pub transform: [f64; 6],
    #[serde(default)]
    pub font_name: String,
}

/// Absolutely positioned span in the text layer (device pixels, y down)
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub left: f64,
    pub top: f64,
    pub font_size: f64,
    pub font_family: String,
    pub opacity: f32,
}

/// Opacity of text-layer spans; low enough to stay invisible over the raster
pub const TEXT_LAYER_OPACITY: f32 = 0.2;

impl TextContentItem {
    /// Font size in user space: length of the matrix's x basis vector
    pub fn font_size(&self) -> f64 {
        let [a, b, ..] = self.transform;
        (a * a + b * b).sqrt()
    }
}

/// Position every item on a page of `base` size (scale 1.0) rendered at `scale`
pub fn layout_text_layer(items: &[TextContentItem], base: PageSize, scale: f64) -> Vec<TextSpan> {
    items
        .iter()
        .filter(|item| !item.text.is_empty())
        .map(|item| {
            let [.., e, f] = item.transform;
            let font_size = item.font_size() * scale;
            // baseline flipped to y-down, span top sits one em above it
            let baseline = (base.height - f) * scale;

            TextSpan {
                text: item.text.clone(),
                left: e * scale,
                top: baseline - font_size,
                font_size,
                font_family: item.font_name.clone(),
                opacity: TEXT_LAYER_OPACITY,
            }
        })
        .collect()
}
