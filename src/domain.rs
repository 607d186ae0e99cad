//! Domain models for modular documents.
//!
//! This module contains the document tree, the reference markers embedded in
//! it, the resolver configuration, and the types that make up a validation
//! report.

/// Document tree nodes.
pub mod node;
pub use node::Node;

/// Typed reference markers (`{"$ref": ...}`).
pub mod reference;
pub use reference::{FileReference, RefMetadata};

pub(crate) mod options;
pub use options::{OptionOverrides, OptionsError, ResolverOptions};

/// Diagnostics produced while resolving a document.
pub mod diagnostic;
pub use diagnostic::{Diagnostic, ErrorKind};

/// Per-run performance metrics.
pub mod metrics;
pub use metrics::PerformanceMetrics;

mod report;
pub use report::{FileResolution, FragmentSummary, ValidationResult};

/// The document schema collaborator.
pub mod schema;
pub use schema::{SchemaReport, SchemaValidator};
