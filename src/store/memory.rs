//! In-process annotation store
//!
//! Behaves like the remote store (ids, timestamps, validation) and can be
//! told to fail, which makes it the backbone of the engine's tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{check_draft, newest_first, AnnotationStore};
use crate::annotations::{Annotation, AnnotationDraft};
use crate::error::StoreError;

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<Annotation>>,
    fail_lists: AtomicBool,
    fail_creates: AtomicBool,
    fail_deletes: AtomicBool,
    create_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

/// Message used for injected failures
const INJECTED_FAILURE: &str = "simulated store outage";

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with existing records (ids and timestamps kept as given)
    pub fn with_records(records: Vec<Annotation>) -> Self {
        let store = Self::new();
        *store.records.lock() = records;
        store
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Number of `create` calls received, failed ones included
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.lock().iter().any(|a| a.id == id)
    }
}

#[async_trait]
impl AnnotationStore for MemoryStore {
    async fn list(&self, article_id: &str) -> Result<Vec<Annotation>, StoreError> {
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(StoreError::Network(INJECTED_FAILURE.to_string()));
        }

        Ok(self
            .records
            .lock()
            .iter()
            .filter(|a| a.article_id == article_id)
            .cloned()
            .collect())
    }

    async fn list_for_author(&self, author_id: &str) -> Result<Vec<Annotation>, StoreError> {
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(StoreError::Network(INJECTED_FAILURE.to_string()));
        }

        let mut records: Vec<Annotation> = self
            .records
            .lock()
            .iter()
            .filter(|a| a.author_id == author_id)
            .cloned()
            .collect();
        newest_first(&mut records);
        Ok(records)
    }

    async fn create(&self, draft: AnnotationDraft) -> Result<Annotation, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(StoreError::Network(INJECTED_FAILURE.to_string()));
        }
        check_draft(&draft)?;

        let annotation = draft.into_annotation(Uuid::new_v4().to_string(), Utc::now());
        self.records.lock().push(annotation.clone());
        Ok(annotation)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Network(INJECTED_FAILURE.to_string()));
        }

        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|a| a.id != id);
        if records.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
