use std::{collections::BTreeMap, path::PathBuf};

use serde::Serialize;

use crate::domain::{Diagnostic, Node, PerformanceMetrics};

/// The outcome of validating a modular document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// `true` only when resolution produced no diagnostics, found no
    /// circular references, and the schema validator accepted the document.
    pub is_valid: bool,

    /// Every structural and schema diagnostic, in the order found.
    pub errors: Vec<Diagnostic>,

    /// Details of the resolution run.
    ///
    /// `None` when the root document itself could not be loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_resolution: Option<FileResolution>,

    /// The fully merged document.
    ///
    /// `None` when the root document itself could not be loaded.
    #[serde(skip)]
    pub document: Option<Node>,
}

impl ValidationResult {
    /// A result for a root document that could not be loaded at all.
    pub(crate) fn fatal(diagnostic: Diagnostic) -> Self {
        Self {
            is_valid: false,
            errors: vec![diagnostic],
            file_resolution: None,
            document: None,
        }
    }

    /// The circular references found, if resolution ran.
    #[must_use]
    pub fn circular_references(&self) -> &[String] {
        self.file_resolution
            .as_ref()
            .map_or(&[], |resolution| resolution.circular_references.as_slice())
    }
}

/// Details of one resolution run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResolution {
    /// Every file substituted into the document, keyed by canonical path.
    pub resolved: BTreeMap<PathBuf, FragmentSummary>,

    /// Each cycle found, rendered as `a.json -> b.json -> a.json` with paths
    /// relative to the root directory.
    pub circular_references: Vec<String>,

    /// Load statistics for the run.
    pub performance_metrics: PerformanceMetrics,

    /// The structural diagnostics of the run.
    pub errors: Vec<Diagnostic>,
}

/// Summary of a file substituted into the merged document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentSummary {
    /// Size of the file in bytes.
    pub size_bytes: u64,
    /// Time taken to read and parse the file when it was first loaded.
    pub load_time_ms: f64,
    /// Hex-encoded SHA-256 of the file content.
    pub fingerprint: String,
    /// The shallowest depth at which the file was inserted.
    pub depth: usize,
    /// How many reference sites in the document point at the file.
    pub reference_count: usize,
    /// Title from the first reference site's metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Version from the first reference site's metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}
