//! The public entry point for resolving and validating modular documents.
//!
//! A [`Resolver`] owns its configuration, its [`ResolutionCache`] and a
//! [`SchemaValidator`]. Validation is synchronous and single-threaded; the
//! cache is not synchronised, so one resolver should not be shared across
//! concurrent calls.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::instrument;

mod benchmark;
mod graph;

pub use benchmark::{AverageMetrics, BenchmarkError, BenchmarkIteration, BenchmarkReport, MemoryUsage};
use graph::GraphWalker;

use crate::{
    domain::{
        Diagnostic, ErrorKind, FileResolution, OptionOverrides, ResolverOptions, SchemaReport,
        SchemaValidator, ValidationResult, schema::PermissiveSchema,
    },
    storage::{FragmentLoader, PathGuard, ResolutionCache, guard::absolute_lexical},
};

/// Resolves modular documents and validates the merged result.
pub struct Resolver {
    options: ResolverOptions,
    cache: ResolutionCache,
    schema: Box<dyn SchemaValidator>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(ResolverOptions::default())
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("options", &self.options)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    /// Creates a resolver with the given defaults and a schema validator that
    /// accepts every document.
    #[must_use]
    pub fn new(options: ResolverOptions) -> Self {
        Self {
            options,
            cache: ResolutionCache::new(),
            schema: Box::new(PermissiveSchema),
        }
    }

    /// Replaces the schema validator.
    #[must_use]
    pub fn with_schema(mut self, schema: impl SchemaValidator + 'static) -> Self {
        self.schema = Box::new(schema);
        self
    }

    /// The instance defaults.
    #[must_use]
    pub const fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// The fragments loaded so far.
    #[must_use]
    pub const fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// Drops every cached fragment.
    ///
    /// This is the only way the cache is ever invalidated.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Resolves and validates the document at `root_path` using the instance
    /// defaults.
    pub fn validate(&mut self, root_path: &Path) -> ValidationResult {
        self.validate_with(root_path, &OptionOverrides::default())
    }

    /// Resolves and validates the document at `root_path`.
    ///
    /// Every reference in the tree is substituted with the content of the file
    /// it names. Problems with individual references are collected rather than
    /// aborting the run. Only a failure to load the root document itself
    /// stops validation early, in which case the result carries that single
    /// error and no [`FileResolution`].
    ///
    /// The fully merged document is then passed to the schema validator,
    /// whose findings are appended to the errors.
    #[instrument(skip(self, overrides), fields(root = %root_path.display()))]
    pub fn validate_with(
        &mut self,
        root_path: &Path,
        overrides: &OptionOverrides,
    ) -> ValidationResult {
        let options = self.options.merged(overrides);
        let root_file = absolute_lexical(root_path);
        let root_dir = security_root(&options, &root_file);

        let guard = PathGuard::new(&root_dir, options.allowed_file_extensions());
        if !guard.contains(&root_file) {
            tracing::error!(
                "Root document {} lies outside the root directory {}",
                root_file.display(),
                guard.root().display()
            );
            return ValidationResult::fatal(Diagnostic::new(
                ErrorKind::PathEscapeRejected,
                root_file.display().to_string(),
                format!(
                    "root document lies outside the root directory {}",
                    guard.root().display()
                ),
            ));
        }

        let loader = FragmentLoader::new(options.max_file_size).confined_to(guard.root());
        let root = match loader.load(&root_file, &mut self.cache) {
            Ok(loaded) => loaded,
            Err(error) => {
                tracing::error!("Failed to load root document: {error}");
                return ValidationResult::fatal(Diagnostic::from_load_error(&error));
            }
        };

        let resolution = GraphWalker::new(&guard, &loader, &mut self.cache, options.max_depth)
            .run(&root_file, &root.fragment);

        let merged = Value::from(&resolution.document);
        let report = self.schema.validate(&merged);
        let schema_errors = schema_diagnostics(report);

        let is_valid = resolution.diagnostics.is_empty()
            && resolution.circular_references.is_empty()
            && schema_errors.is_empty();

        let mut errors = resolution.diagnostics.clone();
        errors.extend(schema_errors);

        tracing::info!(
            "Resolved {} fragments ({} loaded from disk) with {} errors",
            resolution.resolved.len(),
            resolution.metrics.total_files,
            errors.len()
        );

        ValidationResult {
            is_valid,
            errors,
            file_resolution: Some(FileResolution {
                resolved: resolution.resolved,
                circular_references: resolution.circular_references,
                performance_metrics: resolution.metrics,
                errors: resolution.diagnostics,
            }),
            document: Some(resolution.document),
        }
    }
}

/// The configured root directory, or the directory holding the root document.
fn security_root(options: &ResolverOptions, root_file: &Path) -> PathBuf {
    options.root_dir.as_deref().map_or_else(
        || {
            root_file
                .parent()
                .map_or_else(|| root_file.to_path_buf(), Path::to_path_buf)
        },
        absolute_lexical,
    )
}

fn schema_diagnostics(report: SchemaReport) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = report
        .errors
        .into_iter()
        .map(|error| {
            Diagnostic::new(ErrorKind::SchemaViolation, &error.path, error.message)
                .at(error.path)
        })
        .collect();

    if !report.is_valid && diagnostics.is_empty() {
        diagnostics.push(Diagnostic::new(
            ErrorKind::SchemaViolation,
            "",
            "the schema validator rejected the document without giving a reason",
        ));
    }
    diagnostics
}
