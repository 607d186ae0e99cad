//! Modular document resolution
//!
//! A document is a tree of structured content whose nodes may be `$ref`
//! markers pointing at other files under a single root directory. The
//! [`Resolver`] loads the root, substitutes every marker with the content of
//! the file it points to, and reports what it found along the way.

pub mod domain;
pub use domain::{
    Diagnostic, ErrorKind, FileReference, FileResolution, FragmentSummary, Node,
    OptionOverrides, OptionsError, PerformanceMetrics, RefMetadata, ResolverOptions, SchemaReport,
    SchemaValidator, ValidationResult,
};

/// Filesystem access: the path guard, the fragment loader and its cache.
pub mod storage;
pub use storage::{ApprovedPath, FragmentLoader, LoadError, PathGuard, Rejection, ResolutionCache};

/// Reference graph traversal and the public orchestrator.
pub mod resolver;
pub use resolver::{BenchmarkError, BenchmarkReport, Resolver};
