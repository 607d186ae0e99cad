//! Depth-first substitution of reference markers.
//!
//! The walker keeps the chain of files on the current root-to-node path,
//! keyed by canonical path so that symlinked aliases of one file compare
//! equal. A reference to a file already on the chain is a cycle; it is
//! reported and not descended into. Every other failure is recorded at the reference site
//! and the marker is left in place, so one walk reports every problem in the
//! tree.

use std::{
    collections::{BTreeMap, HashSet},
    iter,
    path::{Path, PathBuf},
};

use nonempty::NonEmpty;

use crate::{
    domain::{
        Diagnostic, ErrorKind, FileReference, FragmentSummary, Node, PerformanceMetrics,
        metrics::{MetricsAggregator, millis},
        node::escape_token,
    },
    storage::{CachedFragment, FragmentLoader, PathGuard, ResolutionCache},
};

/// The files on the current traversal path, root first.
#[derive(Debug, Default)]
pub(crate) struct ResolutionChain {
    order: Vec<PathBuf>,
    members: HashSet<PathBuf>,
}

impl ResolutionChain {
    /// Pushes a path, returning `false` if it is already on the chain.
    pub fn push(&mut self, path: PathBuf) -> bool {
        if !self.members.insert(path.clone()) {
            return false;
        }
        self.order.push(path);
        true
    }

    pub fn pop(&mut self) -> Option<PathBuf> {
        let path = self.order.pop()?;
        self.members.remove(&path);
        Some(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.members.contains(path)
    }

    /// The paths on the chain, root first.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.order.iter().map(PathBuf::as_path)
    }

    /// The cycle closed by a reference back to `path`.
    ///
    /// Runs from the first occurrence of `path` on the chain to the end of the
    /// chain, then back to `path`.
    pub fn cycle_to(&self, path: &Path) -> Option<NonEmpty<PathBuf>> {
        if !self.contains(path) {
            return None;
        }
        let start = self.order.iter().position(|p| p == path)?;
        let mut cycle = self.order[start..].to_vec();
        cycle.push(path.to_path_buf());
        NonEmpty::from_vec(cycle)
    }
}

/// Everything a walk produced.
#[derive(Debug)]
pub(crate) struct Resolution {
    pub document: Node,
    pub resolved: BTreeMap<PathBuf, FragmentSummary>,
    pub circular_references: Vec<String>,
    pub metrics: PerformanceMetrics,
    pub diagnostics: Vec<Diagnostic>,
}

/// Walks a document tree, substituting references with fragment content.
pub(crate) struct GraphWalker<'a> {
    guard: &'a PathGuard,
    loader: &'a FragmentLoader,
    cache: &'a mut ResolutionCache,
    max_depth: usize,
    chain: ResolutionChain,
    metrics: MetricsAggregator,
    resolved: BTreeMap<PathBuf, FragmentSummary>,
    circular_references: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> GraphWalker<'a> {
    pub fn new(
        guard: &'a PathGuard,
        loader: &'a FragmentLoader,
        cache: &'a mut ResolutionCache,
        max_depth: usize,
    ) -> Self {
        Self {
            guard,
            loader,
            cache,
            max_depth,
            chain: ResolutionChain::default(),
            metrics: MetricsAggregator::default(),
            resolved: BTreeMap::new(),
            circular_references: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Resolves the root document, loaded from `root_path`.
    ///
    /// The root is at depth 0 and sits at the bottom of the chain, so a
    /// reference back to it is reported as a cycle.
    pub fn run(mut self, root_path: &Path, root: &CachedFragment) -> Resolution {
        let base_dir = self.base_dir_of(root_path);
        self.chain.push(root.canonical_path.clone());
        let document = self.resolve_node(root.content.clone(), &base_dir, 0, "");
        self.chain.pop();

        Resolution {
            document,
            resolved: self.resolved,
            circular_references: self.circular_references,
            metrics: self.metrics.finish(),
            diagnostics: self.diagnostics,
        }
    }

    fn resolve_node(&mut self, node: Node, base_dir: &Path, depth: usize, pointer: &str) -> Node {
        match node {
            Node::Object(map) => Node::Object(
                map.into_iter()
                    .map(|(key, child)| {
                        let pointer = format!("{pointer}/{}", escape_token(&key));
                        let child = self.resolve_node(child, base_dir, depth, &pointer);
                        (key, child)
                    })
                    .collect(),
            ),
            Node::Array(items) => Node::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(index, child)| {
                        let pointer = format!("{pointer}/{index}");
                        self.resolve_node(child, base_dir, depth, &pointer)
                    })
                    .collect(),
            ),
            Node::Content(_) => node,
            Node::Reference(reference) => {
                self.resolve_reference(reference, base_dir, depth, pointer)
            }
        }
    }

    fn resolve_reference(
        &mut self,
        reference: FileReference,
        base_dir: &Path,
        depth: usize,
        pointer: &str,
    ) -> Node {
        let depth = depth + 1;
        if depth > self.max_depth {
            self.record(
                Diagnostic::new(
                    ErrorKind::DepthExceeded,
                    reference.target(),
                    format!(
                        "reference '{}' would be at depth {depth}, exceeding the maximum of {}",
                        reference.target(),
                        self.max_depth
                    ),
                ),
                pointer,
            );
            return Node::Reference(reference);
        }

        let path = match self.guard.resolve(base_dir, reference.target()) {
            Ok(approved) => approved.into_path_buf(),
            Err(rejection) => {
                tracing::warn!("Rejected reference at '{pointer}': {rejection}");
                self.record(Diagnostic::from_rejection(&rejection), pointer);
                return Node::Reference(reference);
            }
        };

        let loaded = match self.loader.load(&path, self.cache) {
            Ok(loaded) => loaded,
            Err(error) => {
                self.record(Diagnostic::from_load_error(&error), pointer);
                return Node::Reference(reference);
            }
        };
        let canonical = &loaded.fragment.canonical_path;

        if let Some(cycle) = self.chain.cycle_to(canonical) {
            let rendered = self.render(cycle.iter().map(PathBuf::as_path));
            let full = self.render(self.chain.paths().chain(iter::once(canonical.as_path())));
            tracing::warn!("Circular reference: {full}");
            self.record(
                Diagnostic::new(
                    ErrorKind::CircularReference,
                    path.display().to_string(),
                    format!("circular reference: {full}"),
                ),
                pointer,
            );
            self.circular_references.push(rendered);
            return Node::Reference(reference);
        }

        if !loaded.cache_hit {
            self.metrics
                .record_load(loaded.fragment.size_bytes, loaded.fragment.load_time);
        }
        self.summarize(&loaded.fragment, depth, &reference);

        tracing::debug!("Substituting {} at '{pointer}'", path.display());
        let base_dir = self.base_dir_of(&path);
        // Each site gets its own copy, so diamond-shaped sharing never aliases.
        let content = loaded.fragment.content.clone();
        self.chain.push(loaded.fragment.canonical_path.clone());
        let merged = self.resolve_node(content, &base_dir, depth, pointer);
        self.chain.pop();
        merged
    }

    fn summarize(&mut self, fragment: &CachedFragment, depth: usize, reference: &FileReference) {
        let summary = self
            .resolved
            .entry(fragment.canonical_path.clone())
            .or_insert_with(|| FragmentSummary {
                size_bytes: fragment.size_bytes,
                load_time_ms: millis(fragment.load_time),
                fingerprint: fragment.fingerprint.clone(),
                depth,
                reference_count: 0,
                title: reference.metadata().and_then(|m| m.title.clone()),
                version: reference.metadata().and_then(|m| m.version.clone()),
            });
        summary.reference_count += 1;
        summary.depth = summary.depth.min(depth);
    }

    fn record(&mut self, diagnostic: Diagnostic, pointer: &str) {
        self.diagnostics.push(diagnostic.at(pointer));
    }

    fn base_dir_of(&self, path: &Path) -> PathBuf {
        path.parent()
            .map_or_else(|| self.guard.root().to_path_buf(), Path::to_path_buf)
    }

    /// Renders paths as `a.json -> b.json`, relative to the root directory.
    fn render<'p>(&self, paths: impl Iterator<Item = &'p Path>) -> String {
        paths
            .map(|path| {
                self.loader
                    .canonical_root()
                    .and_then(|root| path.strip_prefix(root).ok())
                    .or_else(|| path.strip_prefix(self.guard.root()).ok())
                    .unwrap_or(path)
                    .display()
                    .to_string()
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}
