//! Annotation stores
//!
//! A store persists, fetches and deletes annotation records. Stores keep no
//! cache and never retry: every call is a single attempt that either fully
//! succeeds or reports why it failed. Merging results into the in-memory
//! list is the caller's job.

mod http;
mod memory;
mod sqlite;

pub use http::HttpStore;
pub use memory::MemoryStore;
pub use sqlite::{create_pool, SqliteStore};

use async_trait::async_trait;

use crate::annotations::{Annotation, AnnotationDraft};
use crate::error::StoreError;

/// Message returned when a draft lacks its article or author
pub const MISSING_FIELDS_MESSAGE: &str = "Missing required fields: articleId and userId";

/// Remote annotation persistence
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// All annotations for an article, in no particular order
    async fn list(&self, article_id: &str) -> Result<Vec<Annotation>, StoreError>;

    /// Everything an author wrote, newest first
    async fn list_for_author(&self, author_id: &str) -> Result<Vec<Annotation>, StoreError>;

    /// Persist a draft; the store assigns `id` and `createdAt`
    async fn create(&self, draft: AnnotationDraft) -> Result<Annotation, StoreError>;

    /// Remove a record by id
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Reject drafts the store must not accept
pub fn check_draft(draft: &AnnotationDraft) -> Result<(), StoreError> {
    if draft.missing_required_fields() {
        return Err(StoreError::Rejected(MISSING_FIELDS_MESSAGE.to_string()));
    }
    Ok(())
}

/// Newest first, the order `list_for_author` promises
pub(crate) fn newest_first(records: &mut [Annotation]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
