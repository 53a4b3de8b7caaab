use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use docforge_types::query::lookup;
use docforge_types::{Identifier, IdentifierGenerator, Query, Value, ID_KEY};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{DocumentStore, Indices, RawDocument};

/// Documents and index declarations of one kind.
#[derive(Debug, Default)]
struct Collection {
    documents: BTreeMap<Identifier, RawDocument>,
    indices: Indices,
}

impl Collection {
    /// Reject `document` if it repeats a uniquely indexed value held by
    /// another document.
    fn check_unique(&self, kind: &str, id: Identifier, document: &RawDocument) -> StoreResult<()> {
        for (field, spec) in &self.indices {
            if !spec.unique {
                continue;
            }
            let Some(value) = lookup(document, field) else {
                continue;
            };
            let clash = self
                .documents
                .iter()
                .any(|(other, stored)| *other != id && lookup(stored, field) == Some(value));
            if clash {
                return Err(StoreError::DuplicateKey {
                    kind: kind.to_string(),
                    field: field.clone(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    fn register_indices(&mut self, kind: &str, indices: &Indices) -> StoreResult<()> {
        for (field, spec) in indices {
            if spec.unique {
                let mut seen: Vec<&Value> = Vec::new();
                for stored in self.documents.values() {
                    if let Some(value) = lookup(stored, field) {
                        if seen.contains(&value) {
                            return Err(StoreError::DuplicateKey {
                                kind: kind.to_string(),
                                field: field.clone(),
                                value: value.to_string(),
                            });
                        }
                        seen.push(value);
                    }
                }
            }
            self.indices.insert(field.clone(), *spec);
        }
        Ok(())
    }
}

/// In-memory document store.
///
/// Intended for tests and embedding. Collections live in a `HashMap` behind a
/// `RwLock`; documents are cloned on read and write. Data is lost when the
/// store is dropped.
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
    ids: IdentifierGenerator,
}

impl InMemoryDocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            ids: IdentifierGenerator::new(),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    /// Total number of documents across all kinds.
    pub fn len(&self) -> usize {
        self.read()
            .map(|map| map.values().map(|c| c.documents.len()).sum())
            .unwrap_or(0)
    }

    /// Returns `true` if no document is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted names of the kinds that have ever been written.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self
            .read()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();
        kinds.sort();
        kinds
    }

    /// Indices registered for `kind`.
    pub fn indices(&self, kind: &str) -> Indices {
        self.read()
            .ok()
            .and_then(|map| map.get(kind).map(|c| c.indices.clone()))
            .unwrap_or_default()
    }

    /// Remove every document and index.
    pub fn clear(&self) {
        if let Ok(mut map) = self.write() {
            map.clear();
        }
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn find(&self, kind: &str, query: &Query) -> StoreResult<Vec<RawDocument>> {
        let map = self.read()?;
        let Some(collection) = map.get(kind) else {
            return Ok(Vec::new());
        };
        Ok(collection
            .documents
            .values()
            .filter(|doc| query.matches(doc))
            .cloned()
            .collect())
    }

    fn find_one(&self, kind: &str, query: &Query) -> StoreResult<Option<RawDocument>> {
        let map = self.read()?;
        Ok(map.get(kind).and_then(|collection| {
            collection
                .documents
                .values()
                .find(|doc| query.matches(doc))
                .cloned()
        }))
    }

    fn insert(
        &self,
        kind: &str,
        mut document: RawDocument,
        indices: &Indices,
    ) -> StoreResult<Identifier> {
        let id = self.ids.next_id();
        document.insert(ID_KEY.to_string(), id.to_value());

        let mut map = self.write()?;
        let collection = map.entry(kind.to_string()).or_default();
        collection.register_indices(kind, indices)?;
        collection.check_unique(kind, id, &document)?;
        collection.documents.insert(id, document);
        debug!(kind, id = %id.short_hex(), "document inserted");
        Ok(id)
    }

    fn update(&self, kind: &str, id: Identifier, mut document: RawDocument) -> StoreResult<()> {
        document.insert(ID_KEY.to_string(), id.to_value());

        let mut map = self.write()?;
        let collection = map.entry(kind.to_string()).or_default();
        collection.check_unique(kind, id, &document)?;
        let replaced = collection.documents.insert(id, document).is_some();
        debug!(kind, id = %id.short_hex(), replaced, "document saved");
        Ok(())
    }

    fn remove(&self, kind: &str, id: Identifier) -> StoreResult<bool> {
        let mut map = self.write()?;
        Ok(map
            .get_mut(kind)
            .is_some_and(|collection| collection.documents.remove(&id).is_some()))
    }

    fn remove_all(&self, kind: &str) -> StoreResult<usize> {
        let mut map = self.write()?;
        let removed = map.get_mut(kind).map_or(0, |collection| {
            let n = collection.documents.len();
            collection.documents.clear();
            n
        });
        debug!(kind, removed, "kind emptied");
        Ok(removed)
    }

    fn count(&self, kind: &str, query: &Query) -> StoreResult<u64> {
        let map = self.read()?;
        Ok(map.get(kind).map_or(0, |collection| {
            collection
                .documents
                .values()
                .filter(|doc| query.matches(doc))
                .count() as u64
        }))
    }

    /// List values are unwound: each element counts as one occurrence.
    fn distinct(&self, kind: &str, field: &str) -> StoreResult<Vec<(Value, u64)>> {
        let map = self.read()?;
        let mut tally: Vec<(Value, u64)> = Vec::new();
        let Some(collection) = map.get(kind) else {
            return Ok(tally);
        };

        let mut record = |value: &Value| match tally.iter_mut().find(|(v, _)| v == value) {
            Some((_, n)) => *n += 1,
            None => tally.push((value.clone(), 1)),
        };
        for doc in collection.documents.values() {
            match lookup(doc, field) {
                Some(Value::Array(items)) => items.iter().for_each(&mut record),
                Some(value) => record(value),
                None => {}
            }
        }
        Ok(tally)
    }

    fn exists(&self, id: Identifier) -> StoreResult<bool> {
        let map = self.read()?;
        Ok(map
            .values()
            .any(|collection| collection.documents.contains_key(&id)))
    }

    fn ensure_indices(&self, kind: &str, indices: &Indices) -> StoreResult<()> {
        let mut map = self.write()?;
        map.entry(kind.to_string())
            .or_default()
            .register_indices(kind, indices)
    }
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDocumentStore")
            .field("document_count", &self.len())
            .finish()
    }
}
