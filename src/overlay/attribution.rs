//! Per-author attribution
//!
//! Accent colors are derived from the author id alone, so every client
//! agrees on them without any server-side assignment.

use serde::Serialize;

use crate::annotations::Annotation;
use crate::session::ANONYMOUS_LABEL;

/// Accent used for an author's name in the comment list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccentColor {
    pub name: &'static str,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl AccentColor {
    const fn new(name: &'static str, r: u8, g: u8, b: u8) -> Self {
        Self { name, r, g, b }
    }

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

pub const AUTHOR_ACCENTS: [AccentColor; 8] = [
    AccentColor::new("blue", 96, 165, 250),
    AccentColor::new("green", 74, 222, 128),
    AccentColor::new("yellow", 250, 204, 21),
    AccentColor::new("pink", 244, 114, 182),
    AccentColor::new("purple", 192, 132, 252),
    AccentColor::new("cyan", 34, 211, 238),
    AccentColor::new("orange", 251, 146, 60),
    AccentColor::new("teal", 45, 212, 191),
];

/// Id hashed when a record carries no author
const ANONYMOUS_KEY: &str = "anonymous";

/// Palette slot for `author_id`: sum of its character codes modulo the size
pub fn author_color_index(author_id: &str, palette_size: usize) -> usize {
    if palette_size == 0 {
        return 0;
    }
    let key = if author_id.is_empty() { ANONYMOUS_KEY } else { author_id };
    let sum = key.chars().fold(0u64, |acc, c| acc.wrapping_add(c as u64));
    (sum % palette_size as u64) as usize
}

pub fn author_accent(author_id: &str) -> AccentColor {
    AUTHOR_ACCENTS[author_color_index(author_id, AUTHOR_ACCENTS.len())]
}

/// Name shown above a comment
pub fn author_label(annotation: &Annotation, current_user: Option<&str>) -> String {
    if current_user.is_some_and(|uid| uid == annotation.author_id) {
        return "You".to_string();
    }
    if !annotation.author_display_name.trim().is_empty() {
        return annotation.author_display_name.clone();
    }
    if annotation.author_id.is_empty() {
        return ANONYMOUS_LABEL.to_string();
    }
    let short: String = annotation.author_id.chars().take(6).collect();
    format!("User {}", short)
}
