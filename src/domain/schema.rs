//! The document schema is owned elsewhere. The resolver only hands the fully
//! merged document to a [`SchemaValidator`] and folds its findings into the
//! report.

use serde_json::Value;

/// Validates a fully merged document against a document schema.
pub trait SchemaValidator {
    /// Checks the merged document.
    ///
    /// Called exactly once per validation, after resolution has finished.
    fn validate(&self, document: &Value) -> SchemaReport;
}

impl<F> SchemaValidator for F
where
    F: Fn(&Value) -> SchemaReport,
{
    fn validate(&self, document: &Value) -> SchemaReport {
        self(document)
    }
}

/// The findings of a [`SchemaValidator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaReport {
    /// Whether the document conforms to the schema.
    pub is_valid: bool,
    /// The violations found.
    pub errors: Vec<SchemaError>,
}

impl SchemaReport {
    /// A report with no violations.
    #[must_use]
    pub const fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    /// A report with the given violations.
    ///
    /// The report is valid if and only if there are none.
    #[must_use]
    pub fn from_errors(errors: Vec<SchemaError>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    /// JSON pointer to the offending node.
    pub path: String,
    /// What is wrong with it.
    pub message: String,
}

/// Accepts every document.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveSchema;

impl SchemaValidator for PermissiveSchema {
    fn validate(&self, _document: &Value) -> SchemaReport {
        SchemaReport::valid()
    }
}

/// Requires the merged document to be an object with the given top-level keys.
#[derive(Debug, Clone, Default)]
pub struct RequiredKeysSchema {
    keys: Vec<String>,
}

impl RequiredKeysSchema {
    /// Creates a validator requiring each of `keys`.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl SchemaValidator for RequiredKeysSchema {
    fn validate(&self, document: &Value) -> SchemaReport {
        let Some(object) = document.as_object() else {
            return SchemaReport::from_errors(vec![SchemaError {
                path: String::new(),
                message: "document must be an object".to_string(),
            }]);
        };

        let errors = self
            .keys
            .iter()
            .filter(|key| !object.contains_key(key.as_str()))
            .map(|key| SchemaError {
                path: format!("/{}", crate::domain::node::escape_token(key)),
                message: format!("missing required key '{key}'"),
            })
            .collect();

        SchemaReport::from_errors(errors)
    }
}
