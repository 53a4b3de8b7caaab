//! Path-addressed nested property storage.
//!
//! A [`PropertyTree`] maps string segments to scalars, lists or nested trees.
//! Every operation takes a validated [`KeyPath`]. Deleting a leaf never prunes
//! the intermediate trees above it: an emptied tree stays in place and is
//! still reported by [`PropertyTree::contains`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{TreeError, TreeResult};
use crate::key::{validate_key, KeyPath, ID_KEY};
use crate::Map;

/// Nested key/value mapping addressed by key paths.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyTree {
    root: Map,
}

impl PropertyTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from caller-supplied properties.
    ///
    /// Top-level keys are read as dotted keys, so `{"a.b": 1}` produces the
    /// same tree as `{"a": {"b": 1}}`. Nested trees must not contain `_id` or
    /// empty keys.
    pub fn from_properties(properties: Map) -> TreeResult<Self> {
        let mut tree = Self::new();
        for (key, value) in properties {
            let path = validate_key(key.as_str())?;
            check_nested(&value, &path)?;
            tree.set(&path, value)?;
        }
        Ok(tree)
    }

    /// Wrap a mapping read back from storage, as is.
    ///
    /// Unlike [`from_properties`](Self::from_properties), keys are not
    /// re-split on the separator: a stored key `"a.b"` came from a compound
    /// key segment and must stay a single segment.
    pub fn from_map(root: Map) -> Self {
        Self { root }
    }

    /// Number of top-level entries.
    pub fn len(&self) -> usize {
        self.root.len()
    }

    /// Returns `true` if the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Borrow the underlying mapping.
    pub fn as_map(&self) -> &Map {
        &self.root
    }

    /// Deep copy of the underlying mapping.
    pub fn to_map(&self) -> Map {
        self.root.clone()
    }

    /// Consume the tree, returning the underlying mapping.
    pub fn into_map(self) -> Map {
        self.root
    }

    /// Iterate over the top-level entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.root.iter()
    }

    /// Read the value at `path`.
    pub fn get(&self, path: &KeyPath) -> TreeResult<&Value> {
        let (parents, last) = path.split_last();
        let mut node = &self.root;
        for segment in parents {
            node = match node.get(segment) {
                Some(Value::Object(child)) => child,
                _ => return Err(TreeError::MissingKey(path.dotted())),
            };
        }
        node.get(last)
            .ok_or_else(|| TreeError::MissingKey(path.dotted()))
    }

    /// Write `value` at `path`, creating intermediate trees as needed.
    ///
    /// Returns the value previously held at `path`, if any. Fails with
    /// `InvalidKey` when an intermediate segment holds a non-tree value.
    pub fn set(&mut self, path: &KeyPath, value: Value) -> TreeResult<Option<Value>> {
        let (parents, last) = path.split_last();
        let mut node = &mut self.root;
        for segment in parents {
            let entry = node
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            node = match entry {
                Value::Object(child) => child,
                _ => {
                    return Err(TreeError::InvalidKey {
                        key: path.dotted(),
                        reason: format!("segment {segment:?} holds a non-tree value"),
                    })
                }
            };
        }
        Ok(node.insert(last.to_string(), value))
    }

    /// Remove and return the value at `path`.
    pub fn delete(&mut self, path: &KeyPath) -> TreeResult<Value> {
        let (parents, last) = path.split_last();
        let mut node = &mut self.root;
        for segment in parents {
            node = match node.get_mut(segment) {
                Some(Value::Object(child)) => child,
                _ => return Err(TreeError::MissingKey(path.dotted())),
            };
        }
        node.remove(last)
            .ok_or_else(|| TreeError::MissingKey(path.dotted()))
    }

    /// Whether a value exists at `path`. Never fails.
    pub fn contains(&self, path: &KeyPath) -> bool {
        self.get(path).is_ok()
    }

    /// Dotted paths of every leaf, depth-first in key order.
    ///
    /// Empty nested trees count as leaves.
    pub fn paths(&self) -> Vec<String> {
        flatten(&self.root)
            .into_iter()
            .map(|(path, _)| path)
            .collect()
    }
}

impl From<PropertyTree> for Map {
    fn from(tree: PropertyTree) -> Self {
        tree.root
    }
}

/// Flatten a mapping into `(dotted path, leaf value)` pairs.
///
/// Empty nested objects are reported as leaves so that they stay addressable.
pub fn flatten(map: &Map) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    flatten_into(map, "", &mut out);
    out
}

fn flatten_into<'a>(map: &'a Map, prefix: &str, out: &mut Vec<(String, &'a Value)>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(child) if !child.is_empty() => flatten_into(child, &path, out),
            _ => out.push((path, value)),
        }
    }
}

/// Reject nested keys that could never be addressed through a key path.
fn check_nested(value: &Value, path: &KeyPath) -> TreeResult<()> {
    if let Value::Object(map) = value {
        for (key, child) in map {
            if key.is_empty() || key == ID_KEY {
                return Err(TreeError::InvalidKey {
                    key: format!("{}.{key}", path.dotted()),
                    reason: format!("nested keys must be non-empty and not {ID_KEY:?}"),
                });
            }
            check_nested(child, path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn key(s: &str) -> KeyPath {
        validate_key(s).unwrap()
    }

    fn tree(value: Value) -> PropertyTree {
        match value {
            Value::Object(map) => PropertyTree::from_properties(map).unwrap(),
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn set_creates_intermediates() {
        let mut t = PropertyTree::new();
        t.set(&key("a.b.c"), json!(1)).unwrap();
        assert_eq!(t.as_map(), tree(json!({"a": {"b": {"c": 1}}})).as_map());
        assert_eq!(t.get(&key("a.b.c")).unwrap(), &json!(1));
        assert_eq!(t.get(&key("a.b")).unwrap(), &json!({"c": 1}));
    }

    #[test]
    fn set_overwrites_without_merging() {
        let mut t = tree(json!({"tags": ["x", "y"], "n": {"k": 1}}));
        let previous = t.set(&key("tags"), json!(["z"])).unwrap();
        assert_eq!(previous, Some(json!(["x", "y"])));
        t.set(&key("n"), json!(5)).unwrap();
        assert_eq!(t.get(&key("tags")).unwrap(), &json!(["z"]));
        assert_eq!(t.get(&key("n")).unwrap(), &json!(5));
    }

    #[test]
    fn set_through_scalar_fails() {
        let mut t = tree(json!({"a": 1}));
        assert!(matches!(
            t.set(&key("a.b"), json!(2)),
            Err(TreeError::InvalidKey { .. })
        ));
        assert_eq!(t.get(&key("a")).unwrap(), &json!(1));
    }

    #[test]
    fn get_missing_paths() {
        let t = tree(json!({"a": {"b": 1}, "s": "text"}));
        assert_eq!(
            t.get(&key("a.c")),
            Err(TreeError::MissingKey("a.c".into()))
        );
        assert!(t.get(&key("x.y")).is_err());
        // Traversal through a scalar is a missing key, not a panic.
        assert!(t.get(&key("s.deeper")).is_err());
    }

    #[test]
    fn delete_keeps_empty_intermediates() {
        let mut t = tree(json!({"a": {"b": 1}}));
        assert_eq!(t.delete(&key("a.b")).unwrap(), json!(1));
        assert!(!t.contains(&key("a.b")));
        assert!(t.contains(&key("a")));
        assert_eq!(t.get(&key("a")).unwrap(), &json!({}));
        assert_eq!(t.paths(), vec!["a".to_string()]);
    }

    #[test]
    fn delete_twice_fails() {
        let mut t = tree(json!({"a": 1}));
        t.delete(&key("a")).unwrap();
        assert_eq!(t.delete(&key("a")), Err(TreeError::MissingKey("a".into())));
    }

    #[test]
    fn contains_never_fails() {
        let t = tree(json!({"a": [1, 2], "b": {"c": null}}));
        assert!(t.contains(&key("a")));
        assert!(t.contains(&key("b.c")));
        assert!(!t.contains(&key("a.0")));
        assert!(!t.contains(&key("z.z.z")));
    }

    #[test]
    fn dotted_top_level_keys_expand() {
        let t = tree(json!({"a.b": 1, "a.c": 2}));
        assert_eq!(t.as_map(), tree(json!({"a": {"b": 1, "c": 2}})).as_map());
    }

    #[test]
    fn nested_id_is_rejected() {
        let map = json!({"a": {"_id": 1}});
        let Value::Object(map) = map else { unreachable!() };
        assert!(PropertyTree::from_properties(map).is_err());
    }

    #[test]
    fn root_id_is_allowed() {
        let t = tree(json!({"_id": "abc"}));
        assert!(t.contains(&key("_id")));
    }

    #[test]
    fn paths_are_depth_first() {
        let t = tree(json!({"b": 1, "a": {"y": 2, "x": {"z": 3}}}));
        assert_eq!(t.paths(), vec!["a.x.z", "a.y", "b"]);
    }

    #[test]
    fn serde_is_transparent() {
        let t = tree(json!({"a": {"b": 1}}));
        assert_eq!(serde_json::to_value(&t).unwrap(), json!({"a": {"b": 1}}));
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-z]{1,6}"
    }

    fn path() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(segment(), 1..4)
    }

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            "[ -~]{0,12}".prop_map(Value::from),
            prop::collection::vec(any::<i32>(), 0..4).prop_map(Value::from),
        ]
    }

    proptest! {
        #[test]
        fn set_then_get_returns_value(segments in path(), value in leaf()) {
            let mut t = PropertyTree::new();
            let path = validate_key(segments).unwrap();
            t.set(&path, value.clone()).unwrap();
            prop_assert_eq!(t.get(&path).unwrap(), &value);
        }

        #[test]
        fn delete_removes_and_second_delete_fails(segments in path(), value in leaf()) {
            let mut t = PropertyTree::new();
            let path = validate_key(segments).unwrap();
            t.set(&path, value).unwrap();
            t.delete(&path).unwrap();
            prop_assert!(!t.contains(&path));
            prop_assert!(matches!(t.delete(&path), Err(TreeError::MissingKey(_))));
        }
    }
}
