//! Relationship documents and neighbor traversal.
//!
//! A relationship is an ordinary document of kind [`RELATIONSHIP_KIND`]
//! whose `source` and `target` properties hold the identifiers of the two
//! documents it links. Everything else in it describes the edge and can be
//! filtered on during traversal.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use docforge_store::Indices;
use docforge_types::{Identifier, Map, Query};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ForgeError, ForgeResult};
use crate::forge::Forge;
use crate::object::Document;

/// Kind under which relationship documents are stored.
pub const RELATIONSHIP_KIND: &str = "Relationship";

const SOURCE_KEY: &str = "source";
const TARGET_KEY: &str = "target";

/// Which end of a relationship the traversed document sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Relationships targeting the document; neighbors are their sources.
    Ingoing,
    /// Relationships sourced at the document; neighbors are their targets.
    Outgoing,
}

impl Direction {
    /// Property holding the traversed document's identifier.
    fn anchor_key(self) -> &'static str {
        match self {
            Self::Ingoing => TARGET_KEY,
            Self::Outgoing => SOURCE_KEY,
        }
    }

    /// Property holding the neighbor's identifier.
    fn far_key(self) -> &'static str {
        match self {
            Self::Ingoing => SOURCE_KEY,
            Self::Outgoing => TARGET_KEY,
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            Self::Ingoing => Self::Outgoing,
            Self::Outgoing => Self::Ingoing,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingoing => f.write_str("ingoing"),
            Self::Outgoing => f.write_str("outgoing"),
        }
    }
}

/// A relationship document.
#[derive(Clone, Debug)]
pub struct Relationship {
    document: Arc<Document>,
}

impl Relationship {
    /// Build an uncommitted relationship from `source` to `target`.
    ///
    /// Both endpoints must be committed. `properties` describe
    /// the edge and may not use the `source` or `target` keys.
    pub fn create(
        forge: &Forge,
        source: &Document,
        target: &Document,
        properties: Map,
    ) -> ForgeResult<Self> {
        let source_id = source.committed_identifier()?;
        let target_id = target.committed_identifier()?;

        let mut properties = properties;
        for key in [SOURCE_KEY, TARGET_KEY] {
            if properties.contains_key(key) {
                return Err(ForgeError::InvalidKey {
                    key: key.to_string(),
                    reason: "reserved for relationship endpoints".into(),
                });
            }
        }
        properties.insert(SOURCE_KEY.to_string(), source_id.to_value());
        properties.insert(TARGET_KEY.to_string(), target_id.to_value());

        let document = forge.create(RELATIONSHIP_KIND, properties, Indices::new())?;
        Ok(Self { document })
    }

    /// View an existing document as a relationship.
    pub fn from_document(document: Arc<Document>) -> ForgeResult<Self> {
        if document.kind() != RELATIONSHIP_KIND {
            return Err(ForgeError::InvalidIdentifier(format!(
                "{document} is not a relationship"
            )));
        }
        Ok(Self { document })
    }

    /// `(source, target)` identifiers stored in a relationship document.
    pub fn endpoints(document: &Document) -> ForgeResult<(Identifier, Identifier)> {
        let source = Identifier::from_value(&document.get(SOURCE_KEY)?)?;
        let target = Identifier::from_value(&document.get(TARGET_KEY)?)?;
        Ok((source, target))
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn into_document(self) -> Arc<Document> {
        self.document
    }

    pub fn source(&self) -> ForgeResult<Identifier> {
        Ok(Self::endpoints(&self.document)?.0)
    }

    pub fn target(&self) -> ForgeResult<Identifier> {
        Ok(Self::endpoints(&self.document)?.1)
    }
}

impl Forge {
    /// Relationships attached to `document` in `direction`, narrowed by `filter`.
    pub fn relationships_of(
        &self,
        document: &Document,
        direction: Direction,
        filter: &Query,
    ) -> ForgeResult<Vec<Relationship>> {
        let id = document.committed_identifier()?;
        self.find(RELATIONSHIP_KIND, &anchored(id, direction, filter))?
            .into_iter()
            .map(Relationship::from_document)
            .collect()
    }

    /// Documents of `neighbor_kind` linked to `id` by relationships.
    ///
    /// Each neighbor appears once, in the order its first relationship was
    /// returned. Neighbors that do not exist or fail `neighbor_filter` are
    /// left out, as are relationships without a readable far endpoint.
    pub fn neighbors(
        &self,
        id: Identifier,
        direction: Direction,
        neighbor_kind: &str,
        neighbor_filter: &Query,
        relationship_filter: &Query,
    ) -> ForgeResult<Vec<Arc<Document>>> {
        let relationships =
            self.find(RELATIONSHIP_KIND, &anchored(id, direction, relationship_filter))?;

        let mut seen = HashSet::new();
        let mut neighbors = Vec::new();
        for relationship in &relationships {
            let far = match relationship
                .get(direction.far_key())
                .and_then(|value| Ok(Identifier::from_value(&value)?))
            {
                Ok(far) => far,
                Err(e) => {
                    debug!(relationship = %relationship, error = %e, "skipping relationship without endpoint");
                    continue;
                }
            };
            if !seen.insert(far) {
                continue;
            }
            let query = neighbor_filter.merge(&Query::new().with_identifier(far));
            if let Some(neighbor) = self.find_one(neighbor_kind, &query)? {
                neighbors.push(neighbor);
            }
        }

        debug!(
            node = %id.short_hex(),
            %direction,
            neighbor_kind,
            relationships = relationships.len(),
            neighbors = neighbors.len(),
            "neighbors resolved"
        );
        Ok(neighbors)
    }
}

/// `filter` with the anchor endpoint pinned to `id`.
fn anchored(id: Identifier, direction: Direction, filter: &Query) -> Query {
    filter.merge(&Query::new().eq(direction.anchor_key(), id.to_hex()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docforge_store::{DocumentStore, InMemoryDocumentStore};
    use docforge_types::Value;
    use serde_json::json;

    fn props(value: Value) -> Map {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    fn forge() -> Forge {
        Forge::new(Arc::new(InMemoryDocumentStore::new()))
    }

    fn node(forge: &Forge, kind: &str, value: Value) -> Arc<Document> {
        let doc = forge.create(kind, props(value), Indices::new()).unwrap();
        doc.commit_default().unwrap();
        doc
    }

    #[test]
    fn relationship_filter_scenario() {
        let forge = forge();
        let a = node(&forge, "X", json!({"name": "a"}));
        let b = node(&forge, "Y", json!({"name": "b"}));
        a.connect_to(&b, props(json!({"weight": 3}))).unwrap();

        let found = a
            .neighbors(Direction::Outgoing, "Y", &Query::new(), &Query::new())
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(Arc::ptr_eq(&found[0], &b));

        let heavy = Query::new().eq("weight", 4);
        let found = a
            .neighbors(Direction::Outgoing, "Y", &Query::new(), &heavy)
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn ingoing_follows_targets_back() {
        let forge = forge();
        let a = node(&forge, "X", json!({}));
        let b = node(&forge, "Y", json!({}));
        a.connect_to(&b, Map::new()).unwrap();

        let sources = b.in_neighbors("X").unwrap();
        assert_eq!(sources.len(), 1);
        assert!(Arc::ptr_eq(&sources[0], &a));
        assert!(b.out_neighbors("X").unwrap().is_empty());
        assert!(a.in_neighbors("Y").unwrap().is_empty());
    }

    #[test]
    fn neighbor_kind_and_filter_exclude() {
        let forge = forge();
        let a = node(&forge, "X", json!({}));
        let small = node(&forge, "Y", json!({"size": 1}));
        let large = node(&forge, "Y", json!({"size": 9}));
        let other = node(&forge, "Z", json!({"size": 9}));
        for target in [&small, &large, &other] {
            a.connect_to(target, Map::new()).unwrap();
        }

        let found = a
            .neighbors(Direction::Outgoing, "Y", &Query::new().eq("size", 9), &Query::new())
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(Arc::ptr_eq(&found[0], &large));

        let all = a.out_neighbors("Y").unwrap();
        assert_eq!(all.len(), 2);
        assert!(Arc::ptr_eq(&all[0], &small));
        assert!(Arc::ptr_eq(&all[1], &large));
    }

    #[test]
    fn parallel_edges_yield_one_neighbor() {
        let forge = forge();
        let a = node(&forge, "X", json!({}));
        let b = node(&forge, "Y", json!({}));
        a.connect_to(&b, props(json!({"label": "first"}))).unwrap();
        a.connect_to(&b, props(json!({"label": "second"}))).unwrap();

        assert_eq!(forge.relationships_of(&a, Direction::Outgoing, &Query::new()).unwrap().len(), 2);
        assert_eq!(a.out_neighbors("Y").unwrap().len(), 1);
    }

    #[test]
    fn relationship_filter_cannot_move_the_anchor() {
        let forge = forge();
        let a = node(&forge, "X", json!({}));
        let b = node(&forge, "Y", json!({}));
        let c = node(&forge, "X", json!({}));
        c.connect_to(&b, Map::new()).unwrap();

        let hijack = Query::new().eq(SOURCE_KEY, c.identifier().unwrap().to_hex());
        let found = a
            .neighbors(Direction::Outgoing, "Y", &Query::new(), &hijack)
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn removed_neighbor_is_skipped() {
        let forge = forge();
        let a = node(&forge, "X", json!({}));
        let b = node(&forge, "Y", json!({}));
        a.connect_to(&b, Map::new()).unwrap();

        b.remove().unwrap();
        b.discard();
        assert!(a.out_neighbors("Y").unwrap().is_empty());
    }

    #[test]
    fn endpoints_round_trip() {
        let forge = forge();
        let a = node(&forge, "X", json!({}));
        let b = node(&forge, "Y", json!({}));
        let rel = a.connect_to(&b, props(json!({"weight": 1}))).unwrap();

        assert_eq!(rel.source().unwrap(), a.identifier().unwrap());
        assert_eq!(rel.target().unwrap(), b.identifier().unwrap());
        assert_eq!(rel.document().kind(), RELATIONSHIP_KIND);
        assert!(rel.document().is_committed());

        let listed = forge
            .relationships_of(&b, Direction::Ingoing, &Query::new().eq("weight", 1))
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(Arc::ptr_eq(listed[0].document(), rel.document()));
    }

    #[test]
    fn create_requires_committed_endpoints() {
        let forge = forge();
        let a = node(&forge, "X", json!({}));
        let pending = forge.create("Y", Map::new(), Indices::new()).unwrap();

        let err = Relationship::create(&forge, &a, &pending, Map::new()).unwrap_err();
        assert!(matches!(err, ForgeError::UncommittedObject));
        let err = a.connect_to(&pending, Map::new()).unwrap_err();
        assert!(matches!(err, ForgeError::UncommittedObject));
        pending.discard();
    }

    #[test]
    fn endpoint_keys_are_reserved() {
        let forge = forge();
        let a = node(&forge, "X", json!({}));
        let b = node(&forge, "Y", json!({}));
        let err = a.connect_to(&b, props(json!({"target": "elsewhere"}))).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidKey { .. }));
    }

    #[test]
    fn from_document_checks_kind() {
        let forge = forge();
        let a = node(&forge, "X", json!({}));
        assert!(Relationship::from_document(a).is_err());
        assert_eq!(Direction::Outgoing.reverse(), Direction::Ingoing);
    }

    #[test]
    fn modified_document_cannot_traverse() {
        let forge = forge();
        let a = node(&forge, "X", json!({"n": 1}));
        let b = node(&forge, "Y", json!({}));
        a.connect_to(&b, Map::new()).unwrap();

        a.set("n", 2).unwrap();
        assert!(a.identifier().is_some());
        assert!(matches!(
            a.neighbors(Direction::Outgoing, "Y", &Query::new(), &Query::new()),
            Err(ForgeError::UncommittedObject)
        ));
        assert!(matches!(
            forge.relationships_of(&a, Direction::Outgoing, &Query::new()),
            Err(ForgeError::UncommittedObject)
        ));
        assert!(matches!(
            b.connect_to(&a, Map::new()),
            Err(ForgeError::UncommittedObject)
        ));

        a.commit_default().unwrap();
        assert_eq!(a.out_neighbors("Y").unwrap().len(), 1);
    }

    #[test]
    fn unreadable_edges_are_skipped() {
        let forge = forge();
        let a = node(&forge, "X", json!({}));
        let b = node(&forge, "Y", json!({}));
        let source = a.identifier().unwrap().to_hex();
        for broken in [
            json!({"source": source.clone()}),
            json!({"source": source.clone(), "target": "not-hex"}),
        ] {
            forge
                .store()
                .insert(RELATIONSHIP_KIND, props(broken), &Indices::new())
                .unwrap();
        }
        a.connect_to(&b, Map::new()).unwrap();

        let found = a.out_neighbors("Y").unwrap();
        assert_eq!(found.len(), 1);
        assert!(Arc::ptr_eq(&found[0], &b));
    }
}
