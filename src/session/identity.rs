//! Signed-in reader

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Label used when nothing better is known about an author
pub const ANONYMOUS_LABEL: &str = "Anonymous";

/// The reader as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable user id
    pub uid: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_guest: bool,
}

impl Identity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
            email: None,
            is_guest: false,
        }
    }

    /// Anonymous reader with a fresh id; guests may annotate
    pub fn guest() -> Self {
        Self {
            is_guest: true,
            ..Self::new(format!("guest-{}", Uuid::new_v4()))
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Name stored on new annotations: display name, else the e-mail's local
    /// part, else "Anonymous"
    pub fn display_label(&self) -> String {
        if let Some(name) = self.display_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return name.to_string();
        }

        self.email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .map(str::trim)
            .filter(|local| !local.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| ANONYMOUS_LABEL.to_string())
    }
}
