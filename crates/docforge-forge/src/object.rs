use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use docforge_store::Indices;
use docforge_types::{validate_key, Identifier, IntoKeyPath, KeyPath, Map, PropertyTree, Query, Value, ID_KEY};
use tracing::warn;

use crate::error::{ForgeError, ForgeResult};
use crate::forge::Forge;
use crate::relationship::{Direction, Relationship};

/// Mutable part of a document.
#[derive(Debug)]
pub(crate) struct DocumentState {
    pub(crate) properties: PropertyTree,
    /// In-memory state matches what was last written.
    pub(crate) committed: bool,
    /// Set by the first commit, cleared by removal.
    pub(crate) id: Option<Identifier>,
    /// The owner explicitly gave up on committing this document.
    pub(crate) discarded: bool,
}

/// One document of a kind, shared as `Arc<Document>`.
///
/// Documents start uncommitted. Any real property change flags them
/// uncommitted again; writing a value a path already holds does not.
/// Dropping a document that was never committed (nor discarded) logs a
/// warning.
pub struct Document {
    kind: String,
    forge: Forge,
    indices: Indices,
    state: RwLock<DocumentState>,
}

impl Document {
    /// Create a document of `kind` from caller-supplied properties.
    ///
    /// See [`Forge::create`].
    pub fn new(
        forge: &Forge,
        kind: impl Into<String>,
        properties: Map,
        indices: Indices,
    ) -> ForgeResult<Arc<Self>> {
        forge.create(kind, properties, indices)
    }

    pub(crate) fn uncommitted(
        forge: Forge,
        kind: String,
        properties: PropertyTree,
        indices: Indices,
    ) -> Self {
        Self {
            kind,
            forge,
            indices,
            state: RwLock::new(DocumentState {
                properties,
                committed: false,
                id: None,
                discarded: false,
            }),
        }
    }

    pub(crate) fn persisted(
        forge: Forge,
        kind: String,
        properties: PropertyTree,
        indices: Indices,
        id: Identifier,
    ) -> Self {
        Self {
            kind,
            forge,
            indices,
            state: RwLock::new(DocumentState {
                properties,
                committed: true,
                id: Some(id),
                discarded: false,
            }),
        }
    }

    fn read_state(&self) -> ForgeResult<RwLockReadGuard<'_, DocumentState>> {
        self.state
            .read()
            .map_err(|e| ForgeError::LockPoisoned(e.to_string()))
    }

    fn write_state(&self) -> ForgeResult<RwLockWriteGuard<'_, DocumentState>> {
        self.state
            .write()
            .map_err(|e| ForgeError::LockPoisoned(e.to_string()))
    }

    /// The kind (collection) this document belongs to.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The forge this document persists through.
    pub fn forge(&self) -> &Forge {
        &self.forge
    }

    /// Indices declared at construction.
    pub fn indices(&self) -> &Indices {
        &self.indices
    }

    /// Whether the in-memory state has been written to storage.
    pub fn is_committed(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .committed
    }

    /// The persistent identifier, once the document has been committed.
    pub fn identifier(&self) -> Option<Identifier> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).id
    }

    /// The identifier, provided storage matches the in-memory state.
    pub(crate) fn committed_identifier(&self) -> ForgeResult<Identifier> {
        let state = self.read_state()?;
        committed_id(&state)
    }

    // ---------------------------------------------------------------
    // Properties
    // ---------------------------------------------------------------

    /// Value at `key`.
    pub fn get(&self, key: impl IntoKeyPath) -> ForgeResult<Value> {
        let path = validate_key(key)?;
        let state = self.read_state()?;
        if path.is_reserved_root() && path.len() == 1 {
            return state
                .id
                .map(|id| id.to_value())
                .ok_or_else(|| ForgeError::MissingKey(path.dotted()));
        }
        Ok(state.properties.get(&path)?.clone())
    }

    /// Value at `key`, or `default` when the path does not exist.
    pub fn get_property(&self, key: impl IntoKeyPath, default: Value) -> ForgeResult<Value> {
        match self.get(key) {
            Err(ForgeError::MissingKey(_)) => Ok(default),
            other => other,
        }
    }

    /// Whether a value exists at `key`.
    pub fn contains(&self, key: impl IntoKeyPath) -> ForgeResult<bool> {
        let path = validate_key(key)?;
        let state = self.read_state()?;
        if path.is_reserved_root() && path.len() == 1 {
            return Ok(state.id.is_some());
        }
        Ok(state.properties.contains(&path))
    }

    /// Write `value` at `key`.
    ///
    /// Flags the document uncommitted unless `key` already holds `value`.
    pub fn set(&self, key: impl IntoKeyPath, value: impl Into<Value>) -> ForgeResult<()> {
        let path = mutable_path(key)?;
        let value = value.into();
        let mut state = self.write_state()?;

        if state
            .properties
            .get(&path)
            .is_ok_and(|current| *current == value)
        {
            return Ok(());
        }

        state.properties.set(&path, value)?;
        state.committed = false;
        Ok(())
    }

    /// Remove and return the value at `key`. Flags the document uncommitted.
    pub fn delete(&self, key: impl IntoKeyPath) -> ForgeResult<Value> {
        let path = mutable_path(key)?;
        let mut state = self.write_state()?;
        let removed = state.properties.delete(&path)?;
        state.committed = false;
        Ok(removed)
    }

    /// Deep copy of the properties, with `_id` when the document has one.
    ///
    /// Mutating the copy never affects the document.
    pub fn properties(&self) -> ForgeResult<Map> {
        let state = self.read_state()?;
        let mut map = state.properties.to_map();
        if let Some(id) = state.id {
            map.insert(ID_KEY.to_string(), id.to_value());
        }
        Ok(map)
    }

    // ---------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------

    /// Write this document to storage and return its identifier.
    ///
    /// Does nothing on an already committed document. `patch` values are
    /// written in place of the current ones for the duration of the write
    /// only; afterwards the in-memory properties are exactly what they were
    /// before the call.
    pub fn commit(self: &Arc<Self>, patch: Map) -> ForgeResult<Identifier> {
        let patch = patch
            .into_iter()
            .map(|(key, value)| Ok((mutable_path(key.as_str())?, value)))
            .collect::<ForgeResult<Vec<(KeyPath, Value)>>>()?;

        let mut state = self.write_state()?;
        if state.committed {
            if let Some(id) = state.id {
                return Ok(id);
            }
        }

        let snapshot = (!patch.is_empty()).then(|| state.properties.clone());
        let mut outcome: ForgeResult<()> = Ok(());
        for (path, value) in patch {
            if let Err(e) = state.properties.set(&path, value) {
                outcome = Err(e.into());
                break;
            }
        }

        let written = outcome.and_then(|()| {
            self.forge
                .persist(self, &self.kind, &self.indices, &state.properties, state.id)
        });

        if let Some(original) = snapshot {
            state.properties = original;
        }

        let id = written?;
        state.id = Some(id);
        state.committed = true;
        Ok(id)
    }

    /// [`commit`](Self::commit) without a patch.
    pub fn commit_default(self: &Arc<Self>) -> ForgeResult<Identifier> {
        self.commit(Map::new())
    }

    /// Delete this document from storage.
    ///
    /// The document stays usable in memory, flagged uncommitted and without
    /// an identifier.
    pub fn remove(&self) -> ForgeResult<()> {
        let mut state = self.write_state()?;
        let id = committed_id(&state)?;
        self.forge.remove(&self.kind, id, self)?;
        state.id = None;
        state.committed = false;
        Ok(())
    }

    /// Give up on committing this document; silences the drop warning.
    pub fn discard(&self) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .discarded = true;
    }

    /// Forget the stored counterpart after its kind was emptied in storage.
    pub(crate) fn detach(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.id = None;
        state.committed = false;
    }

    // ---------------------------------------------------------------
    // Graph
    // ---------------------------------------------------------------

    /// Documents of `neighbor_kind` linked to this one by relationships.
    ///
    /// `Outgoing` follows relationships whose source is this document,
    /// `Ingoing` those whose target is this document. Neighbors failing
    /// `neighbor_filter` are left out.
    pub fn neighbors(
        &self,
        direction: Direction,
        neighbor_kind: &str,
        neighbor_filter: &Query,
        relationship_filter: &Query,
    ) -> ForgeResult<Vec<Arc<Document>>> {
        let id = self.committed_identifier()?;
        self.forge.neighbors(
            id,
            direction,
            neighbor_kind,
            neighbor_filter,
            relationship_filter,
        )
    }

    /// Unfiltered outgoing neighbors of `neighbor_kind`.
    pub fn out_neighbors(&self, neighbor_kind: &str) -> ForgeResult<Vec<Arc<Document>>> {
        self.neighbors(Direction::Outgoing, neighbor_kind, &Query::new(), &Query::new())
    }

    /// Unfiltered ingoing neighbors of `neighbor_kind`.
    pub fn in_neighbors(&self, neighbor_kind: &str) -> ForgeResult<Vec<Arc<Document>>> {
        self.neighbors(Direction::Ingoing, neighbor_kind, &Query::new(), &Query::new())
    }

    /// Create and commit a relationship from this document to `target`.
    pub fn connect_to(&self, target: &Document, properties: Map) -> ForgeResult<Relationship> {
        let relationship = Relationship::create(&self.forge, self, target, properties)?;
        relationship.document().commit_default()?;
        Ok(relationship)
    }
}

fn committed_id(state: &DocumentState) -> ForgeResult<Identifier> {
    match state.id {
        Some(id) if state.committed => Ok(id),
        _ => Err(ForgeError::UncommittedObject),
    }
}

/// Validate a key that is about to be written through the property interface.
fn mutable_path(key: impl IntoKeyPath) -> ForgeResult<KeyPath> {
    let path = validate_key(key)?;
    if path.is_reserved_root() {
        return Err(ForgeError::ReservedKey);
    }
    Ok(path)
}

impl Drop for Document {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !state.committed && !state.discarded {
            warn!(kind = %self.kind, "document dropped without having been committed");
        }
        if let Some(id) = state.id {
            self.forge.release(id);
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Document")
            .field("kind", &self.kind)
            .field("id", &state.id)
            .field("committed", &state.committed)
            .field("properties", &state.properties)
            .finish()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identifier() {
            Some(id) if self.is_committed() => write!(f, "<{} {}>", self.kind, id),
            Some(id) => write!(f, "<{} {} (modified)>", self.kind, id),
            None => write!(f, "<{} (uncommitted)>", self.kind),
        }
    }
}
