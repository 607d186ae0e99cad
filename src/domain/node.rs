use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::domain::FileReference;

/// A node in a document tree.
///
/// Parsed fragment content is converted into this tagged form once, at load
/// time, so resolution can match on the kind of node rather than probing
/// objects for a `$ref` key at every step.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A keyed container.
    Object(BTreeMap<String, Node>),
    /// An ordered container.
    Array(Vec<Node>),
    /// A leaf value: null, boolean, number or string.
    Content(Value),
    /// A marker standing in for the content of another file.
    Reference(FileReference),
}

impl Node {
    /// Returns `true` if this node is a reference marker.
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_))
    }

    /// Iterates over every reference marker in the tree, depth-first.
    pub fn references(&self) -> impl Iterator<Item = &FileReference> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            while let Some(node) = stack.pop() {
                match node {
                    Self::Reference(reference) => return Some(reference),
                    Self::Object(map) => stack.extend(map.values().rev()),
                    Self::Array(items) => stack.extend(items.iter().rev()),
                    Self::Content(_) => {}
                }
            }
            None
        })
    }

    /// Looks up a node by JSON pointer (`/chapters/0/title`).
    #[must_use]
    pub fn pointer(&self, pointer: &str) -> Option<&Self> {
        if pointer.is_empty() {
            return Some(self);
        }
        let rest = pointer.strip_prefix('/')?;
        rest.split('/').try_fold(self, |node, token| {
            let token = unescape_token(token);
            match node {
                Self::Object(map) => map.get(&token),
                Self::Array(items) => token.parse::<usize>().ok().and_then(|i| items.get(i)),
                Self::Content(_) | Self::Reference(_) => None,
            }
        })
    }
}

/// Escapes an object key for use as a JSON pointer token.
pub(crate) fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => FileReference::from_marker(&map).map_or_else(
                || Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
                Self::Reference,
            ),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            scalar => Self::Content(scalar),
        }
    }
}

impl From<&Node> for Value {
    fn from(node: &Node) -> Self {
        match node {
            Node::Object(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect(),
            ),
            Node::Array(items) => Self::Array(items.iter().map(Self::from).collect()),
            Node::Content(value) => value.clone(),
            Node::Reference(reference) => reference.to_value(),
        }
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        match node {
            Node::Object(map) => Self::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
            Node::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Node::Content(value) => value,
            Node::Reference(reference) => reference.to_value(),
        }
    }
}

impl Serialize for Node {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Object(map) => serializer.collect_map(map),
            Self::Array(items) => serializer.collect_seq(items),
            Self::Content(value) => value.serialize(serializer),
            Self::Reference(reference) => reference.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn markers_become_references() {
        let node = Node::from(json!({
            "title": "Book",
            "chapters": [{"$ref": "./one.json"}, {"$ref": "./two.json"}]
        }));

        let targets: Vec<_> = node.references().map(FileReference::target).collect();
        assert_eq!(targets, ["./one.json", "./two.json"]);
        assert!(node.pointer("/chapters/1").unwrap().is_reference());
    }

    #[test]
    fn document_without_markers_round_trips_unchanged() {
        let value = json!({"a": [1, 2, {"b": null}], "c": "text", "d": true});
        let node = Node::from(value.clone());

        assert_eq!(node.references().count(), 0);
        assert_eq!(Value::from(&node), value);
        assert_eq!(serde_json::to_value(&node).unwrap(), value);
    }

    #[test]
    fn pointer_lookup_unescapes_tokens() {
        let node = Node::from(json!({"a/b": {"~c": 1}, "list": [10, 20]}));

        assert_eq!(node.pointer("/a~1b/~0c"), Some(&Node::Content(json!(1))));
        assert_eq!(node.pointer("/list/1"), Some(&Node::Content(json!(20))));
        assert_eq!(node.pointer("/list/7"), None);
        assert_eq!(node.pointer("missing-slash"), None);
        assert_eq!(escape_token("a/b~c"), "a~1b~0c");
    }
}
