//! The security boundary for reference paths.
//!
//! Every check in this module is purely lexical. A reference is either
//! approved or rejected before the filesystem is touched, so a rejected
//! reference never reveals whether anything exists at the location it names.
//!
//! Checks run in a fixed order:
//!
//! 1. **Syntax**: the reference must be non-empty, free of control
//!    characters, start with `./` or `../` and end in an allowed extension.
//!    Strings that look absolute are reported as absolute rather than merely
//!    malformed.
//! 2. **Absoluteness**: no segment may carry a drive or stream marker (`C:`).
//! 3. **Containment**: `.` and `..` are resolved against the base directory;
//!    the result must lie strictly inside the root.
//! 4. **Extension**: the normalised file name must end in an allowed
//!    extension.
//!
//! Both `/` and `\` are treated as separators on every platform.

use std::{
    fmt,
    path::{Component, Path, PathBuf},
};

use crate::domain::{ErrorKind, options::extension_matches};

/// Approves or rejects reference paths against a root directory.
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
    extensions: Vec<String>,
}

impl PathGuard {
    /// Creates a guard for the given root directory.
    ///
    /// The root is normalised lexically; a relative root is taken relative to
    /// the current working directory. `extensions` are expected in the
    /// normalised form kept by [`ResolverOptions`](crate::ResolverOptions).
    #[must_use]
    pub fn new(root: &Path, extensions: &[String]) -> Self {
        Self {
            root: absolute_lexical(root),
            extensions: extensions.to_vec(),
        }
    }

    /// The normalised root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Checks whether a normalised absolute path lies strictly inside the root.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root) && path != self.root.as_path()
    }

    /// Resolves a raw reference against `base_dir`.
    ///
    /// `base_dir` is the directory of the file the reference appears in.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] describing the first check that failed.
    pub fn resolve(&self, base_dir: &Path, reference: &str) -> Result<ApprovedPath, Rejection> {
        self.check_syntax(reference)?;
        let segments = check_segments(reference)?;
        let normalized = self.normalize(base_dir, reference, &segments)?;
        self.check_extension(reference, normalized)
    }

    fn check_syntax(&self, reference: &str) -> Result<(), Rejection> {
        if reference.trim().is_empty() {
            return Err(Rejection::malformed(reference, "reference is empty"));
        }
        if reference.chars().any(char::is_control) {
            return Err(Rejection::malformed(
                reference,
                "reference contains control characters",
            ));
        }
        if looks_absolute(reference) {
            return Err(Rejection::AbsolutePath {
                reference: reference.to_string(),
            });
        }
        if !has_relative_marker(reference) {
            return Err(Rejection::malformed(
                reference,
                "reference must start with './' or '../'",
            ));
        }
        if !extension_matches(&self.extensions, reference) {
            return Err(Rejection::malformed(
                reference,
                "reference does not end in an allowed extension",
            ));
        }
        Ok(())
    }

    fn normalize(
        &self,
        base_dir: &Path,
        reference: &str,
        segments: &[&str],
    ) -> Result<PathBuf, Rejection> {
        let escape = || Rejection::PathEscape {
            reference: reference.to_string(),
            root: self.root.clone(),
        };

        let mut path = absolute_lexical(base_dir);
        for segment in segments {
            match *segment {
                "" | "." => {}
                ".." => {
                    if !path.pop() {
                        return Err(escape());
                    }
                }
                name => path.push(name),
            }
        }

        if self.contains(&path) {
            Ok(path)
        } else {
            Err(escape())
        }
    }

    fn check_extension(&self, reference: &str, path: PathBuf) -> Result<ApprovedPath, Rejection> {
        let allowed = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| extension_matches(&self.extensions, name));

        if allowed {
            Ok(ApprovedPath(path))
        } else {
            Err(Rejection::Extension {
                reference: reference.to_string(),
                path,
            })
        }
    }
}

fn has_relative_marker(reference: &str) -> bool {
    ["./", ".\\", "../", "..\\"]
        .iter()
        .any(|marker| reference.starts_with(marker))
}

/// Leading separators, drive letters, UNC shares and URLs.
fn looks_absolute(reference: &str) -> bool {
    reference.starts_with(['/', '\\'])
        || has_drive_prefix(reference)
        || reference.contains("://")
        || Path::new(reference).is_absolute()
}

fn has_drive_prefix(segment: &str) -> bool {
    let mut chars = segment.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic()
    )
}

fn check_segments(reference: &str) -> Result<Vec<&str>, Rejection> {
    let segments: Vec<&str> = reference.split(['/', '\\']).collect();
    if segments.iter().any(|segment| segment.contains(':')) {
        return Err(Rejection::AbsolutePath {
            reference: reference.to_string(),
        });
    }
    Ok(segments)
}

/// Makes a path absolute and resolves `.` and `..` without touching the
/// filesystem.
///
/// `..` above the filesystem root is dropped, as the operating system does.
pub(crate) fn absolute_lexical(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                normalized.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
        }
    }
    normalized
}

/// A reference path that has passed every lexical check.
///
/// The path is absolute, normalised, strictly inside the root, and ends in
/// an allowed extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApprovedPath(PathBuf);

impl ApprovedPath {
    /// The approved path.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Consumes the approval, returning the path.
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for ApprovedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ApprovedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Why a reference was not approved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// The reference fails the syntactic check.
    #[error("malformed reference '{reference}': {reason}")]
    MalformedReference {
        /// The raw reference.
        reference: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// The reference is absolute.
    #[error("absolute reference '{reference}' rejected: references must be relative")]
    AbsolutePath {
        /// The raw reference.
        reference: String,
    },

    /// The reference resolves outside the root directory.
    #[error("reference '{reference}' escapes the root directory {}", root.display())]
    PathEscape {
        /// The raw reference.
        reference: String,
        /// The root directory.
        root: PathBuf,
    },

    /// The normalised path does not end in an allowed extension.
    #[error("reference '{reference}' resolves to {}, which does not have an allowed extension", path.display())]
    Extension {
        /// The raw reference.
        reference: String,
        /// The normalised path.
        path: PathBuf,
    },
}

impl Rejection {
    fn malformed(reference: &str, reason: &'static str) -> Self {
        Self::MalformedReference {
            reference: reference.to_string(),
            reason,
        }
    }

    /// The diagnostic kind for this rejection.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedReference { .. } => ErrorKind::MalformedReference,
            Self::AbsolutePath { .. } => ErrorKind::AbsolutePathRejected,
            Self::PathEscape { .. } => ErrorKind::PathEscapeRejected,
            Self::Extension { .. } => ErrorKind::ExtensionRejected,
        }
    }

    /// The raw reference that was rejected.
    #[must_use]
    pub fn reference(&self) -> &str {
        match self {
            Self::MalformedReference { reference, .. }
            | Self::AbsolutePath { reference }
            | Self::PathEscape { reference, .. }
            | Self::Extension { reference, .. } => reference,
        }
    }
}
