//! In-process document store.
//!
//! Each collection is a `Vec` of documents behind a `DashMap` shard lock, so
//! the uniqueness check and the insert happen under the same guard.

use super::{Document, Filter, Patch, StoreError};
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<DashMap<String, Vec<Document>>>,
    unique_fields: Arc<DashMap<String, Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure_unique_index(&self, collection: &str, field: &str) {
        let mut fields = self.unique_fields.entry(collection.to_string()).or_default();
        if !fields.iter().any(|f| f == field) {
            fields.push(field.to_string());
        }
    }

    pub fn find_one(&self, collection: &str, filter: &Filter) -> Option<Document> {
        self.collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| filter.matches(doc)).cloned())
    }

    pub fn find_many(&self, collection: &str, filter: &Filter) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|docs| docs.iter().filter(|doc| filter.matches(doc)).cloned().collect())
            .unwrap_or_default()
    }

    pub fn insert_one(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        let unique = self
            .unique_fields
            .get(collection)
            .map(|fields| fields.clone())
            .unwrap_or_default();

        let mut docs = self.collections.entry(collection.to_string()).or_default();

        for field in unique {
            let Some(value) = document.get(&field) else {
                continue;
            };
            if docs.iter().any(|doc| doc.get(&field) == Some(value)) {
                return Err(StoreError::UniqueViolation {
                    collection: collection.to_string(),
                    field,
                });
            }
        }

        docs.push(document);
        Ok(())
    }

    pub fn update_one(&self, collection: &str, filter: &Filter, patch: &Patch) -> u64 {
        let Some(mut docs) = self.collections.get_mut(collection) else {
            return 0;
        };
        match docs.iter_mut().find(|doc| filter.matches(doc)) {
            Some(doc) => {
                patch.apply(doc);
                1
            }
            None => 0,
        }
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |docs| docs.len())
    }
}
