//! In-memory annotation list for one article
//!
//! Keyed by annotation id. Every mutation is a delta against the current
//! contents so results of store calls can be applied in completion order.

use std::collections::HashSet;

use super::types::Annotation;

/// Id-keyed list in comment-panel order (newest saves first)
#[derive(Debug, Clone, Default)]
pub struct AnnotationList {
    items: Vec<Annotation>,
    /// Ids deleted through this list; store ids are never reused
    removed: HashSet<String>,
}

impl AnnotationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from store records, keeping the last record for a repeated id
    pub fn from_records(records: impl IntoIterator<Item = Annotation>) -> Self {
        let mut list = Self::new();
        for record in records {
            list.upsert(record);
        }
        list
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.items.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.items.iter().find(|a| a.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn ids(&self) -> HashSet<String> {
        self.items.iter().map(|a| a.id.clone()).collect()
    }

    /// Annotations drawn on `page`, in list order
    pub fn on_page(&self, page: u32) -> impl Iterator<Item = &Annotation> {
        self.items.iter().filter(move |a| a.is_on_page(page))
    }

    /// Put a freshly saved annotation at the top of the panel.
    ///
    /// Returns `false` if a record with the same id was already present; it is
    /// replaced and moved to the front.
    pub fn prepend(&mut self, annotation: Annotation) -> bool {
        let existed = match self.position(&annotation.id) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        };
        self.items.insert(0, annotation);
        !existed
    }

    /// Replace a record in place, or append it if unknown
    pub fn upsert(&mut self, annotation: Annotation) -> bool {
        match self.position(&annotation.id) {
            Some(index) => {
                self.items[index] = annotation;
                false
            }
            None => {
                self.items.push(annotation);
                true
            }
        }
    }

    /// Drop a deleted record. The id is remembered so that a fetch issued
    /// before the delete cannot bring it back.
    pub fn remove(&mut self, id: &str) -> Option<Annotation> {
        self.removed.insert(id.to_string());
        self.position(id).map(|index| self.items.remove(index))
    }

    pub fn was_removed(&self, id: &str) -> bool {
        self.removed.contains(id)
    }

    /// Apply a full fetch issued when the list held `known_before`.
    ///
    /// Fetched records are upserted unless they were deleted locally. A
    /// record is dropped only if it was known when the fetch started and the
    /// fetch no longer returns it; anything added while the fetch was in
    /// flight survives.
    pub fn merge_fetched(&mut self, fetched: Vec<Annotation>, known_before: &HashSet<String>) {
        let fetched_ids: HashSet<String> = fetched.iter().map(|a| a.id.clone()).collect();

        self.items
            .retain(|a| !known_before.contains(&a.id) || fetched_ids.contains(&a.id));

        for record in fetched {
            if self.removed.contains(&record.id) {
                continue;
            }
            self.upsert(record);
        }
    }

    /// Chronological view, newest first
    pub fn sorted_by_created_desc(&self) -> Vec<&Annotation> {
        let mut sorted: Vec<&Annotation> = self.items.iter().collect();
        sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sorted
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|a| a.id == id)
    }
}
