use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Configuration for resolving modular documents.
///
/// These are the instance defaults of a [`Resolver`](crate::Resolver). Any
/// single call may override them with [`OptionOverrides`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct ResolverOptions {
    /// The maximum size, in bytes, of any single file.
    ///
    /// Larger files are rejected without reading their contents.
    pub max_file_size: u64,

    /// The maximum depth of a reference chain.
    ///
    /// The root document is at depth 0 and each reference adds one.
    pub max_depth: usize,

    /// File extensions a reference may point at.
    ///
    /// Stored lower case with a leading dot, for example `.json`.
    allowed_file_extensions: Vec<String>,

    /// The directory no reference may resolve outside of.
    ///
    /// When `None`, the directory containing the root document is used.
    pub root_dir: Option<PathBuf>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            max_depth: default_max_depth(),
            allowed_file_extensions: default_extensions(),
            root_dir: None,
        }
    }
}

impl ResolverOptions {
    /// Loads options from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, OptionsError> {
        let content = std::fs::read_to_string(path).map_err(|source| OptionsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| OptionsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Saves the options to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the options cannot be serialized or if the file
    /// cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), OptionsError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| OptionsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns the allowed file extensions.
    #[must_use]
    pub fn allowed_file_extensions(&self) -> &[String] {
        &self.allowed_file_extensions
    }

    /// Replaces the allowed file extensions.
    ///
    /// Extensions are normalised to lower case with a leading dot, and
    /// duplicates are removed.
    pub fn set_allowed_file_extensions<I, S>(&mut self, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_file_extensions = normalize_extensions(extensions);
    }

    /// Checks whether a file name ends in one of the allowed extensions.
    ///
    /// The name must have at least one character before the extension.
    #[must_use]
    pub fn is_extension_allowed(&self, file_name: &str) -> bool {
        extension_matches(&self.allowed_file_extensions, file_name)
    }

    /// Returns a copy of these options with the given overrides applied.
    #[must_use]
    pub fn merged(&self, overrides: &OptionOverrides) -> Self {
        let mut merged = self.clone();
        if let Some(max_file_size) = overrides.max_file_size {
            merged.max_file_size = max_file_size;
        }
        if let Some(max_depth) = overrides.max_depth {
            merged.max_depth = max_depth;
        }
        if let Some(extensions) = &overrides.allowed_file_extensions {
            merged.set_allowed_file_extensions(extensions);
        }
        merged
    }
}

pub(crate) fn extension_matches(extensions: &[String], file_name: &str) -> bool {
    let file_name = file_name.to_lowercase();
    extensions
        .iter()
        .any(|ext| file_name.len() > ext.len() && file_name.ends_with(ext.as_str()))
}

fn normalize_extensions<I, S>(extensions: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for ext in extensions {
        let ext = ext.as_ref().trim().to_lowercase();
        if ext.is_empty() || ext == "." {
            continue;
        }
        let ext = if ext.starts_with('.') {
            ext
        } else {
            format!(".{ext}")
        };
        if !normalized.contains(&ext) {
            normalized.push(ext);
        }
    }
    normalized
}

/// Per-call overrides of [`ResolverOptions`].
///
/// Fields left as `None` fall back to the resolver's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionOverrides {
    /// Overrides [`ResolverOptions::max_file_size`].
    pub max_file_size: Option<u64>,
    /// Overrides [`ResolverOptions::max_depth`].
    pub max_depth: Option<usize>,
    /// Overrides the allowed file extensions.
    pub allowed_file_extensions: Option<Vec<String>>,
}

impl OptionOverrides {
    /// Overrides the maximum file size.
    #[must_use]
    pub const fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    /// Overrides the maximum reference depth.
    #[must_use]
    pub const fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Overrides the allowed file extensions.
    #[must_use]
    pub fn allowed_file_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_file_extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }
}

/// Errors that can occur when loading or saving options.
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    /// The options file could not be read.
    #[error("failed to read options file {}: {source}", path.display())]
    Read {
        /// The file that was read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// The options file is not valid TOML, or has invalid values.
    #[error("failed to parse options file {}: {source}", path.display())]
    Parse {
        /// The file that was parsed.
        path: PathBuf,
        /// The underlying TOML error.
        source: toml::de::Error,
    },
    /// The options could not be serialized.
    #[error("failed to serialize options: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// The options file could not be written.
    #[error("failed to write options file {}: {source}", path.display())]
    Write {
        /// The file that was written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

const fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

const fn default_max_depth() -> usize {
    10
}

fn default_extensions() -> Vec<String> {
    normalize_extensions([".json", ".yaml", ".yml"])
}

/// The serialized versions of the options.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_max_file_size")]
        max_file_size: u64,

        #[serde(default = "default_max_depth")]
        max_depth: usize,

        #[serde(default = "default_extensions")]
        allowed_file_extensions: Vec<String>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        root_dir: Option<PathBuf>,
    },
}

impl From<Versions> for ResolverOptions {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                max_file_size,
                max_depth,
                allowed_file_extensions,
                root_dir,
            } => Self {
                max_file_size,
                max_depth,
                allowed_file_extensions: normalize_extensions(allowed_file_extensions),
                root_dir,
            },
        }
    }
}

impl From<ResolverOptions> for Versions {
    fn from(options: ResolverOptions) -> Self {
        Self::V1 {
            max_file_size: options.max_file_size,
            max_depth: options.max_depth,
            allowed_file_extensions: options.allowed_file_extensions,
            root_dir: options.root_dir,
        }
    }
}
