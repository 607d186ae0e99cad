use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// The key that marks an object as a file reference.
pub const REF_KEY: &str = "$ref";

/// The optional sibling key carrying descriptive metadata for a reference.
pub const METADATA_KEY: &str = "refMetadata";

/// Descriptive metadata attached to a reference marker.
///
/// `title` and `version` are recognised explicitly. Any other keys are kept
/// verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefMetadata {
    /// Human-readable title of the referenced fragment.
    #[serde(
        default,
        deserialize_with = "scalar_as_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,

    /// Version of the referenced fragment.
    ///
    /// Numeric versions (`"version": 2`) are accepted and stored as strings.
    #[serde(
        default,
        deserialize_with = "scalar_as_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,

    /// Any other metadata keys.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string or number, found {other}"
        ))),
    }
}

/// A typed marker standing in for content stored in another file.
///
/// On the wire a reference is an object of the form
/// `{"$ref": "./relative/path.json", "refMetadata": {...}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct FileReference {
    target: String,

    /// The `$ref` value as written, when it was not a string.
    raw_target: Option<Value>,

    metadata: Option<RefMetadata>,
}

impl FileReference {
    /// Creates a reference to the given relative path.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            raw_target: None,
            metadata: None,
        }
    }

    /// Attaches descriptive metadata to the reference.
    #[must_use]
    pub fn with_metadata(mut self, metadata: RefMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The raw reference string, exactly as written in the document.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The metadata attached to the marker, if any.
    #[must_use]
    pub const fn metadata(&self) -> Option<&RefMetadata> {
        self.metadata.as_ref()
    }

    /// Interprets an object as a reference marker.
    ///
    /// Returns `None` if the object has no `$ref` key. A non-string `$ref`
    /// is checked in its JSON rendering, so the guard rejects it as malformed
    /// instead of it being silently treated as content, and the original
    /// value is kept for the wire form. Metadata that cannot be interpreted
    /// is dropped.
    pub(crate) fn from_marker(map: &Map<String, Value>) -> Option<Self> {
        let (target, raw_target) = match map.get(REF_KEY)? {
            Value::String(s) => (s.clone(), None),
            other => (other.to_string(), Some(other.clone())),
        };

        let metadata = map.get(METADATA_KEY).and_then(|value| {
            serde_json::from_value(value.clone())
                .inspect_err(|e| {
                    tracing::debug!("Ignoring unreadable metadata on reference '{target}': {e}");
                })
                .ok()
        });

        Some(Self {
            target,
            raw_target,
            metadata,
        })
    }

    /// Renders the marker back into its wire form.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        let target = self
            .raw_target
            .clone()
            .unwrap_or_else(|| Value::String(self.target.clone()));
        map.insert(REF_KEY.to_string(), target);
        if let Some(metadata) = &self.metadata {
            if let Ok(value) = serde_json::to_value(metadata) {
                map.insert(METADATA_KEY.to_string(), value);
            }
        }
        Value::Object(map)
    }
}

impl Serialize for FileReference {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn marker(value: &Value) -> Option<FileReference> {
        FileReference::from_marker(value.as_object().unwrap())
    }

    #[test]
    fn object_without_ref_is_not_a_marker() {
        assert!(marker(&json!({"title": "Chapter"})).is_none());
    }

    #[test]
    fn marker_with_metadata() {
        let reference = marker(&json!({
            "$ref": "./chapter1.json",
            "refMetadata": {"title": "Chapter 1", "version": 2, "owner": "docs"}
        }))
        .unwrap();

        assert_eq!(reference.target(), "./chapter1.json");
        let metadata = reference.metadata().unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Chapter 1"));
        assert_eq!(metadata.version.as_deref(), Some("2"));
        assert_eq!(metadata.extra.get("owner"), Some(&json!("docs")));
    }

    #[test]
    fn non_string_target_is_kept_verbatim() {
        let wire = json!({"$ref": 42});
        let reference = marker(&wire).unwrap();
        assert_eq!(reference.target(), "42");
        assert_eq!(reference.to_value(), wire);
    }

    #[test]
    fn unreadable_metadata_is_dropped() {
        let reference = marker(&json!({
            "$ref": "./a.json",
            "refMetadata": {"title": ["not", "a", "string"]}
        }))
        .unwrap();
        assert!(reference.metadata().is_none());
    }

    #[test]
    fn renders_wire_form() {
        let reference = FileReference::new("./a.json").with_metadata(RefMetadata {
            title: Some("A".to_string()),
            ..RefMetadata::default()
        });

        assert_eq!(
            reference.to_value(),
            json!({"$ref": "./a.json", "refMetadata": {"title": "A"}})
        );
        assert_eq!(serde_json::to_value(&reference).unwrap(), reference.to_value());
    }
}
