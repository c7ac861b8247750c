//! Selection geometry
//!
//! Converts client rectangles reported by the viewer (device pixels at the
//! current zoom) into percentages of the page container, and back.
//! Both the selection and the container are measured at the same scale, so
//! the division cancels the zoom factor out.

use serde::{Deserialize, Serialize};

use crate::annotations::FractionalRect;

/// Rectangle in viewport (client) pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClientRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ClientRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left && x <= self.right() && y >= self.top && y <= self.bottom()
    }

    /// A container we cannot divide by
    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite()) || self.width <= 0.0 || self.height <= 0.0
    }

    pub fn size(&self) -> PageSize {
        PageSize {
            width: self.width,
            height: self.height,
        }
    }
}

/// Rendered size of a page container at the current zoom
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn scaled(&self, scale: f64) -> Self {
        Self {
            width: self.width * scale,
            height: self.height * scale,
        }
    }
}

/// Box in device pixels, relative to the page container's origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl DeviceRect {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left && x <= self.left + self.width && y >= self.top && y <= self.top + self.height
    }
}

/// Selection text plus its regions on one page
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSelection {
    /// Trimmed selection text
    pub text: String,
    pub regions: Vec<FractionalRect>,
}

/// Normalize a live selection against its page container.
///
/// Returns `None` when the trimmed text is empty or when there is no usable
/// container; callers treat both as "do not open a draft".
pub fn normalize_selection(
    text: &str,
    rects: &[ClientRect],
    container: Option<&ClientRect>,
) -> Option<NormalizedSelection> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let container = container.filter(|c| !c.is_degenerate())?;

    let regions = rects
        .iter()
        .map(|rect| to_fractional(rect, container))
        .collect::<Vec<_>>();

    tracing::debug!(
        regions = regions.len(),
        container_width = container.width,
        container_height = container.height,
        "Normalized selection"
    );

    Some(NormalizedSelection {
        text: text.to_string(),
        regions,
    })
}

/// One client rectangle as percentages of `container`
pub fn to_fractional(rect: &ClientRect, container: &ClientRect) -> FractionalRect {
    FractionalRect {
        left: (rect.left - container.left) / container.width * 100.0,
        top: (rect.top - container.top) / container.height * 100.0,
        width: rect.width / container.width * 100.0,
        height: rect.height / container.height * 100.0,
    }
}

/// Inverse of [`to_fractional`] at the page's current rendered size.
///
/// The region is clamped to the page box first.
pub fn to_device(region: &FractionalRect, page: PageSize) -> DeviceRect {
    let region = region.clamped();
    DeviceRect {
        left: region.left / 100.0 * page.width,
        top: region.top / 100.0 * page.height,
        width: region.width / 100.0 * page.width,
        height: region.height / 100.0 * page.height,
    }
}
