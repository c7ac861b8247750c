//! Error types for the annotation engine

use thiserror::Error;

/// Engine-wide result type
pub type Result<T> = std::result::Result<T, AnnotatorError>;

/// Top-level engine error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnnotatorError {
    /// Rejected locally before any network call
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Failed at the remote store boundary
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Problems caught by the session controller itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please select some text before saving")]
    EmptySelection,

    #[error("You must be logged in to save annotations")]
    NotAuthenticated,

    #[error("No annotation draft is open")]
    NoDraft,

    #[error("This annotation is already being saved")]
    SaveInProgress,
}

/// Failures reported by an annotation store
///
/// Messages from the remote side are kept verbatim so they can be shown to
/// the user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store refused the request (validation, permissions, quota)
    #[error("{0}")]
    Rejected(String),

    #[error("Annotation not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid response from annotation store: {0}")]
    InvalidResponse(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
            other => StoreError::Database(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::InvalidResponse(err.to_string())
        } else {
            StoreError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::InvalidResponse(err.to_string())
    }
}

impl AnnotatorError {
    /// Whether the user can expect a retry of the same action to help
    pub fn is_retryable(&self) -> bool {
        match self {
            AnnotatorError::Validation(_) => false,
            AnnotatorError::Store(_) => true,
        }
    }
}
