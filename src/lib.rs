//! Paper Annotator
//!
//! Capture, persistence and overlay rendering for comments attached to
//! highlighted passages of a PDF.
//!
//! # Modules
//!
//! - `geometry`: converts viewport-relative selections into page percentages
//! - `store`: remote annotation persistence (HTTP, SQLite, in-memory)
//! - `overlay`: redraws highlights for the current page and zoom
//! - `session`: selection → draft → save/cancel state machine
//! - `viewer`: rendering-surface abstraction (canvas and viewer-plugin backends)
//! - `routes`: HTTP API served by the `annotation-server` binary

pub mod annotations;
pub mod config;
pub mod error;
pub mod geometry;
pub mod overlay;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod viewer;

pub use annotations::{Annotation, AnnotationDraft, AnnotationList, FractionalRect, HighlightColor};
pub use config::Config;
pub use error::{AnnotatorError, Result, StoreError, ValidationError};
pub use session::{Identity, SessionController, SessionState};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Calling this twice is harmless; the
/// second call is ignored.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
