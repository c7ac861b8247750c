//! Annotation data types
//!
//! Field names on the wire follow the document store's records
//! (`userId`, `highlightAreas`, `highlightColor`, ...).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Highlight region as percentages (0-100) of the unscaled page box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FractionalRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl FractionalRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Clip the region to the page box.
    ///
    /// Sub-pixel rounding can push `left + width` or `top + height` past 100;
    /// such regions are trimmed, never rejected.
    pub fn clamped(&self) -> Self {
        let left = self.left.clamp(0.0, 100.0);
        let top = self.top.clamp(0.0, 100.0);
        let right = (self.left + self.width).clamp(0.0, 100.0);
        let bottom = (self.top + self.height).clamp(0.0, 100.0);

        Self {
            left,
            top,
            width: (right - left).max(0.0),
            height: (bottom - top).max(0.0),
        }
    }
}

/// Highlighter palette offered to the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    #[default]
    Yellow,
    Green,
    Blue,
    Pink,
}

/// Straight-alpha color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// CSS `rgba()` notation
    pub fn css(&self) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

impl HighlightColor {
    pub const ALL: [HighlightColor; 4] = [
        HighlightColor::Yellow,
        HighlightColor::Green,
        HighlightColor::Blue,
        HighlightColor::Pink,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "yellow",
            HighlightColor::Green => "green",
            HighlightColor::Blue => "blue",
            HighlightColor::Pink => "pink",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "Yellow",
            HighlightColor::Green => "Green",
            HighlightColor::Blue => "Blue",
            HighlightColor::Pink => "Pink",
        }
    }

    /// Translucent fill used for page overlays
    pub fn fill(&self) -> Rgba {
        match self {
            HighlightColor::Yellow => Rgba::new(255, 255, 0, 0.4),
            HighlightColor::Green => Rgba::new(74, 222, 128, 0.4),
            HighlightColor::Blue => Rgba::new(96, 165, 250, 0.4),
            HighlightColor::Pink => Rgba::new(244, 114, 182, 0.4),
        }
    }

    /// Stronger swatch for palette buttons and comment borders
    pub fn swatch(&self) -> Rgba {
        self.fill().with_alpha(0.8)
    }
}

impl fmt::Display for HighlightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown highlight color: {0}")]
pub struct UnknownColor(pub String);

impl FromStr for HighlightColor {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yellow" => Ok(HighlightColor::Yellow),
            "green" => Ok(HighlightColor::Green),
            "blue" => Ok(HighlightColor::Blue),
            "pink" => Ok(HighlightColor::Pink),
            _ => Err(UnknownColor(s.to_string())),
        }
    }
}

/// A persisted annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Store-assigned identifier
    pub id: String,
    /// The article this annotation belongs to
    pub article_id: String,
    /// Creating user (guests included)
    #[serde(rename = "userId")]
    pub author_id: String,
    /// Label captured at creation; not refreshed on rename
    #[serde(rename = "userName", default)]
    pub author_display_name: String,
    /// 1-based page number
    pub page_number: u32,
    pub highlighted_text: String,
    #[serde(rename = "comment", default)]
    pub comment_text: String,
    /// Regions in selection order
    #[serde(rename = "highlightAreas", default)]
    pub highlight_regions: Vec<FractionalRect>,
    #[serde(rename = "highlightColor", default)]
    pub color: HighlightColor,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// An annotation composed locally and not yet confirmed by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationDraft {
    pub article_id: String,
    #[serde(rename = "userId")]
    pub author_id: String,
    #[serde(rename = "userName", default)]
    pub author_display_name: String,
    pub page_number: u32,
    pub highlighted_text: String,
    #[serde(rename = "comment", default)]
    pub comment_text: String,
    #[serde(rename = "highlightAreas", default)]
    pub highlight_regions: Vec<FractionalRect>,
    #[serde(rename = "highlightColor", default)]
    pub color: HighlightColor,
}

impl AnnotationDraft {
    /// Fields the store insists on before accepting a draft
    pub fn missing_required_fields(&self) -> bool {
        self.article_id.trim().is_empty() || self.author_id.trim().is_empty()
    }

    /// Attach the identity and timestamp handed out by the store
    pub fn into_annotation(self, id: String, created_at: DateTime<Utc>) -> Annotation {
        Annotation {
            id,
            article_id: self.article_id,
            author_id: self.author_id,
            author_display_name: self.author_display_name,
            page_number: self.page_number,
            highlighted_text: self.highlighted_text,
            comment_text: self.comment_text,
            highlight_regions: self.highlight_regions,
            color: self.color,
            created_at,
            updated_at: Some(created_at),
        }
    }
}

impl Annotation {
    /// Whether this annotation should be drawn on `page`
    pub fn is_on_page(&self, page: u32) -> bool {
        self.page_number == page
    }

    pub fn has_comment(&self) -> bool {
        !self.comment_text.trim().is_empty()
    }
}
