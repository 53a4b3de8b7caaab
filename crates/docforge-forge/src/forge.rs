//! The identity cache between documents and the document store.
//!
//! [`Forge`] maps each persisted [`Identifier`] to a weak handle on the one
//! live [`Document`] representing it. Every read, write and removal goes
//! through it, so two lookups that reach the same stored document return
//! the same `Arc<Document>`.
//!
//! # Invariants
//!
//! - At most one live document per identifier.
//! - The cache never keeps a document alive; entries of dropped documents
//!   are evicted by the document's drop hook.
//! - A storage write and the registration of its identifier happen inside
//!   one critical section.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use docforge_store::{DocumentStore, Indices, RawDocument, StoreError};
use docforge_types::{Identifier, Map, PropertyTree, Query, Value, ID_KEY};
use tracing::debug;

use crate::error::{ForgeError, ForgeResult};
use crate::object::Document;

type Cache = HashMap<Identifier, Weak<Document>>;

struct ForgeInner {
    store: Arc<dyn DocumentStore>,
    cache: Mutex<Cache>,
    /// Kinds whose declared indices were already sent to storage.
    indexed_kinds: Mutex<HashSet<String>>,
}

/// Handle on the identity cache. Cloning is cheap and shares the cache.
#[derive(Clone)]
pub struct Forge {
    inner: Arc<ForgeInner>,
}

impl Forge {
    /// Create a forge with an empty cache over `store`.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner: Arc::new(ForgeInner {
                store,
                cache: Mutex::new(HashMap::new()),
                indexed_kinds: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// The underlying document store.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.inner.store
    }

    fn lock_cache(&self) -> ForgeResult<MutexGuard<'_, Cache>> {
        self.inner
            .cache
            .lock()
            .map_err(|e| ForgeError::LockPoisoned(e.to_string()))
    }

    /// Whether both forges share the same cache.
    pub fn same_as(&self, other: &Forge) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ---------------------------------------------------------------
    // Cache inspection
    // ---------------------------------------------------------------

    /// The live document cached for `id`, if any.
    pub fn cached(&self, id: Identifier) -> Option<Arc<Document>> {
        let cache = self.lock_cache().ok()?;
        cache.get(&id).and_then(Weak::upgrade)
    }

    /// Number of cached documents that are still alive.
    pub fn live_count(&self) -> usize {
        self.lock_cache()
            .map(|cache| cache.values().filter(|w| w.strong_count() > 0).count())
            .unwrap_or(0)
    }

    /// Whether storage holds a document with this identifier.
    ///
    /// Always asks storage; the cache is not proof of existence.
    pub fn exists(&self, id: Identifier) -> ForgeResult<bool> {
        Ok(self.inner.store.exists(id)?)
    }

    // ---------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------

    /// Create a document of `kind` from caller-supplied properties.
    ///
    /// Without `_id` the document is new and uncommitted. With `_id` (hex
    /// string or `{"$oid": hex}`) the document is taken as already
    /// persisted: the live cached instance is returned if there is one,
    /// otherwise storage must hold a document of `kind` under that
    /// identifier or the call fails with `InvalidIdentifier`.
    pub fn create(
        &self,
        kind: impl Into<String>,
        properties: Map,
        indices: Indices,
    ) -> ForgeResult<Arc<Document>> {
        let kind = kind.into();
        let mut properties = properties;
        let raw_id = properties.remove(ID_KEY);
        let tree = PropertyTree::from_properties(properties)?;
        if tree.as_map().contains_key(ID_KEY) {
            return Err(ForgeError::ReservedKey);
        }

        let Some(raw_id) = raw_id else {
            return Ok(Arc::new(Document::uncommitted(
                self.clone(),
                kind,
                tree,
                indices,
            )));
        };
        let id = Identifier::from_value(&raw_id)?;

        if let Some(existing) = self.cached(id) {
            return check_kind(existing, &kind, id);
        }
        let query = Query::new().with_identifier(id);
        if self.inner.store.find_one(&kind, &query)?.is_none() {
            return Err(ForgeError::InvalidIdentifier(format!(
                "no {kind} document with identifier {id}"
            )));
        }

        let document = {
            let mut cache = self.lock_cache()?;
            match cache.get(&id).and_then(Weak::upgrade) {
                Some(existing) => existing,
                None => {
                    let document = Arc::new(Document::persisted(
                        self.clone(),
                        kind.clone(),
                        tree,
                        indices,
                        id,
                    ));
                    cache.insert(id, Arc::downgrade(&document));
                    document
                }
            }
        };
        check_kind(document, &kind, id)
    }

    // ---------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------

    /// Write a document's properties and register its identifier.
    ///
    /// A document without an identifier is inserted; one that already has
    /// an identifier is saved under it. Declared indices are sent to
    /// storage with the first insert of each kind only.
    pub(crate) fn persist(
        &self,
        document: &Arc<Document>,
        kind: &str,
        indices: &Indices,
        properties: &PropertyTree,
        existing: Option<Identifier>,
    ) -> ForgeResult<Identifier> {
        let body = properties.to_map();
        let mut cache = self.lock_cache()?;

        let id = match existing {
            Some(id) => {
                self.inner.store.update(kind, id, body)?;
                id
            }
            None => {
                let mut indexed = self
                    .inner
                    .indexed_kinds
                    .lock()
                    .map_err(|e| ForgeError::LockPoisoned(e.to_string()))?;
                let first = !indexed.contains(kind);
                let declared = if first { indices.clone() } else { Indices::new() };
                let id = self.inner.store.insert(kind, body, &declared)?;
                if first {
                    indexed.insert(kind.to_string());
                }
                id
            }
        };

        cache.insert(id, Arc::downgrade(document));
        debug!(kind, id = %id.short_hex(), update = existing.is_some(), "document persisted");
        Ok(id)
    }

    /// Delete a document from storage and evict its cache entry.
    pub(crate) fn remove(&self, kind: &str, id: Identifier, document: &Document) -> ForgeResult<()> {
        let mut cache = self.lock_cache()?;
        let existed = self.inner.store.remove(kind, id)?;
        if cache
            .get(&id)
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), document))
        {
            cache.remove(&id);
        }
        debug!(kind, id = %id.short_hex(), existed, "document removed");
        Ok(())
    }

    /// Delete every stored document of `kind`.
    ///
    /// Live documents of that kind are detached: they lose their identifier,
    /// are flagged uncommitted and leave the cache. Committing one again
    /// stores it as a new document.
    pub fn remove_all(&self, kind: &str) -> ForgeResult<usize> {
        let removed = self.inner.store.remove_all(kind)?;

        let mut detached = Vec::new();
        let mut others = Vec::new();
        {
            let mut cache = self.lock_cache()?;
            cache.retain(|_, weak| match weak.upgrade() {
                Some(document) if document.kind() == kind => {
                    detached.push(document);
                    false
                }
                Some(document) => {
                    others.push(document);
                    true
                }
                None => false,
            });
        }
        drop(others);

        for document in &detached {
            document.detach();
        }
        debug!(kind, removed, detached = detached.len(), "kind removed");
        Ok(removed)
    }

    /// Evict the entry for `id` if its document is gone.
    ///
    /// Called from the document drop hook; never fails.
    pub(crate) fn release(&self, id: Identifier) {
        if let Ok(mut cache) = self.inner.cache.lock() {
            if cache.get(&id).is_some_and(|weak| weak.strong_count() == 0) {
                cache.remove(&id);
            }
        }
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// Documents of `kind` matching `query`, in storage order.
    ///
    /// A result whose identifier has a live cached document yields that
    /// document unchanged: in-memory state wins over the fetched payload.
    pub fn find(&self, kind: &str, query: &Query) -> ForgeResult<Vec<Arc<Document>>> {
        let raw = self.inner.store.find(kind, query)?;
        let decoded = raw
            .into_iter()
            .map(decode)
            .collect::<ForgeResult<Vec<_>>>()?;
        debug!(kind, results = decoded.len(), "find");
        self.materialize(kind, decoded)
    }

    /// First document of `kind` matching `query`.
    pub fn find_one(&self, kind: &str, query: &Query) -> ForgeResult<Option<Arc<Document>>> {
        let Some(raw) = self.inner.store.find_one(kind, query)? else {
            return Ok(None);
        };
        let decoded = decode(raw)?;
        Ok(self.materialize(kind, vec![decoded])?.pop())
    }

    /// The document of `kind` with identifier `id`, from cache or storage.
    pub fn get(&self, kind: &str, id: Identifier) -> ForgeResult<Option<Arc<Document>>> {
        if let Some(document) = self.cached(id) {
            if document.kind() == kind {
                return Ok(Some(document));
            }
            return Ok(None);
        }
        self.find_one(kind, &Query::new().with_identifier(id))
    }

    /// Resolve decoded documents through the cache.
    ///
    /// A live document cached under the same identifier but for another
    /// kind is left out. Handles are only released after the lock is gone.
    fn materialize(
        &self,
        kind: &str,
        decoded: Vec<(Identifier, PropertyTree)>,
    ) -> ForgeResult<Vec<Arc<Document>>> {
        let mut documents = Vec::with_capacity(decoded.len());
        let mut foreign = Vec::new();
        {
            let mut cache = self.lock_cache()?;
            for (id, tree) in decoded {
                match cache.get(&id).and_then(Weak::upgrade) {
                    Some(live) if live.kind() == kind => documents.push(live),
                    Some(live) => foreign.push(live),
                    None => {
                        let document = Arc::new(Document::persisted(
                            self.clone(),
                            kind.to_string(),
                            tree,
                            Indices::new(),
                            id,
                        ));
                        cache.insert(id, Arc::downgrade(&document));
                        documents.push(document);
                    }
                }
            }
        }
        for live in &foreign {
            debug!(
                kind,
                cached_kind = live.kind(),
                id = ?live.identifier(),
                "skipping document cached under another kind"
            );
        }
        Ok(documents)
    }

    // ---------------------------------------------------------------
    // Aggregates
    // ---------------------------------------------------------------

    /// Number of documents of `kind` matching `query`.
    pub fn count(&self, kind: &str, query: &Query) -> ForgeResult<u64> {
        Ok(self.inner.store.count(kind, query)?)
    }

    /// Distinct values of `field` across `kind` with their counts.
    pub fn distinct(&self, kind: &str, field: &str) -> ForgeResult<Vec<(Value, u64)>> {
        Ok(self.inner.store.distinct(kind, field)?)
    }
}

/// Split a raw document into its identifier and property tree.
fn decode(mut raw: RawDocument) -> ForgeResult<(Identifier, PropertyTree)> {
    let value = raw
        .remove(ID_KEY)
        .ok_or_else(|| StoreError::InvalidDocument("stored document has no _id".into()))?;
    let id = Identifier::from_value(&value)
        .map_err(|e| StoreError::InvalidDocument(format!("stored _id: {e}")))?;
    Ok((id, PropertyTree::from_map(raw)))
}

fn check_kind(document: Arc<Document>, kind: &str, id: Identifier) -> ForgeResult<Arc<Document>> {
    if document.kind() == kind {
        Ok(document)
    } else {
        Err(ForgeError::InvalidIdentifier(format!(
            "{id} belongs to kind {}, not {kind}",
            document.kind()
        )))
    }
}

impl fmt::Debug for Forge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forge")
            .field("live", &self.live_count())
            .finish()
    }
}
