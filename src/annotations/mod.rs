//! Annotation module
//!
//! A comment bound to a highlighted passage of one PDF page.
//!
//! # Features
//!
//! - Zoom-independent highlight regions (percentages of the logical page)
//! - Fixed highlight palette
//! - An id-keyed in-memory list that accepts deltas from concurrent
//!   store calls

mod list;
mod types;

pub use list::AnnotationList;
pub use types::{
    Annotation, AnnotationDraft, FractionalRect, HighlightColor, Rgba, UnknownColor,
};
