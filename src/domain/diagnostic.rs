use std::fmt;

use serde::Serialize;

use crate::storage::{LoadError, Rejection};

/// The kind of problem a [`Diagnostic`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ErrorKind {
    /// The reference string is empty, lacks a relative marker, or does not
    /// end in an allowed extension.
    MalformedReference,
    /// The reference is an absolute path, drive path or network share.
    AbsolutePathRejected,
    /// The reference resolves outside the root directory.
    PathEscapeRejected,
    /// The normalised path does not end in an allowed extension.
    ExtensionRejected,
    /// The referenced file does not exist.
    FileNotFound,
    /// The referenced file exceeds the maximum file size.
    FileTooLarge,
    /// The referenced file could not be parsed.
    ParseError,
    /// The referenced file could not be read.
    IoError,
    /// The reference chain exceeds the maximum depth.
    DepthExceeded,
    /// The reference points back at a file already on the active chain.
    CircularReference,
    /// The merged document was rejected by the schema validator.
    SchemaViolation,
}

impl ErrorKind {
    /// The broad class of the problem: `security`, `io`, `graph` or `schema`.
    #[must_use]
    pub const fn class(self) -> &'static str {
        match self {
            Self::MalformedReference
            | Self::AbsolutePathRejected
            | Self::PathEscapeRejected
            | Self::ExtensionRejected => "security",
            Self::FileNotFound | Self::FileTooLarge | Self::ParseError | Self::IoError => "io",
            Self::DepthExceeded | Self::CircularReference => "graph",
            Self::SchemaViolation => "schema",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A single problem found while resolving or validating a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// What went wrong.
    pub kind: ErrorKind,

    /// The offending path: the raw reference string for rejected
    /// references, otherwise the file or document path concerned.
    pub path: String,

    /// JSON pointer to the reference site within the merged document.
    pub pointer: String,

    /// A human-readable description.
    pub message: String,
}

impl Diagnostic {
    /// Creates a diagnostic at the document root.
    #[must_use]
    pub fn new(kind: ErrorKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            pointer: String::new(),
            message: message.into(),
        }
    }

    /// Sets the JSON pointer of the reference site.
    #[must_use]
    pub fn at(mut self, pointer: impl Into<String>) -> Self {
        self.pointer = pointer.into();
        self
    }

    pub(crate) fn from_rejection(rejection: &Rejection) -> Self {
        Self::new(rejection.kind(), rejection.reference(), rejection.to_string())
    }

    pub(crate) fn from_load_error(error: &LoadError) -> Self {
        Self::new(
            error.kind(),
            error.path().display().to_string(),
            error.to_string(),
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pointer.is_empty() {
            write!(f, "[{}] {}", self.kind, self.message)
        } else {
            write!(f, "[{}] {} (at {})", self.kind, self.message, self.pointer)
        }
    }
}
