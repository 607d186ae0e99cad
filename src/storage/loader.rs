use std::{
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::{
    domain::{ErrorKind, Node},
    storage::{CachedFragment, ResolutionCache},
};

/// The on-disk format of a fragment, inferred from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `.yaml` and `.yml` files.
    Yaml,
    /// Everything else.
    Json,
}

impl Format {
    /// Infers the format from a file path.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Json,
        }
    }

    fn parse(self, bytes: &[u8]) -> Result<Value, String> {
        match self {
            Self::Json => serde_json::from_slice(bytes).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_slice(bytes).map_err(|e| e.to_string()),
        }
    }
}

/// Reads fragment files, enforcing a size limit and root confinement.
#[derive(Debug, Clone)]
pub struct FragmentLoader {
    max_file_size: u64,
    canonical_root: Option<PathBuf>,
}

/// A fragment returned by [`FragmentLoader::load`].
#[derive(Debug, Clone)]
pub struct LoadedFragment {
    /// The fragment, shared with the cache.
    pub fragment: Arc<CachedFragment>,
    /// `true` if the fragment was served from the cache.
    pub cache_hit: bool,
}

impl FragmentLoader {
    /// Creates a loader that rejects files larger than `max_file_size` bytes.
    #[must_use]
    pub const fn new(max_file_size: u64) -> Self {
        Self {
            max_file_size,
            canonical_root: None,
        }
    }

    /// Requires every loaded file to resolve, after following symlinks, to a
    /// location inside `root`.
    ///
    /// If `root` cannot be canonicalised it does not exist, and no file under
    /// it can be loaded either; confinement is then left to the lexical guard.
    #[must_use]
    pub fn confined_to(mut self, root: &Path) -> Self {
        self.canonical_root = fs::canonicalize(root)
            .inspect_err(|e| {
                tracing::debug!("Cannot canonicalise root {}: {e}", root.display());
            })
            .ok();
        self
    }

    /// The canonicalised root every loaded file must lie within, if any.
    #[must_use]
    pub fn canonical_root(&self) -> Option<&Path> {
        self.canonical_root.as_deref()
    }

    /// Loads the fragment at `path`, consulting `cache` first.
    ///
    /// The path is canonicalised and confined before the cache is consulted,
    /// so the cache is keyed by the physical file and every lexical alias of
    /// it shares one entry. On a miss the file is opened once, its handle is
    /// stat'ed and checked against the size limit, and at most one byte more
    /// than the limit is read.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, escapes the root through a
    /// symlink, is too large, cannot be read, or cannot be parsed.
    #[instrument(level = "trace", skip_all, fields(path = %path.display()))]
    pub fn load(&self, path: &Path, cache: &mut ResolutionCache) -> Result<LoadedFragment, LoadError> {
        let canonical_path =
            fs::canonicalize(path).map_err(|source| LoadError::from_io(path, source))?;
        self.check_confined(path, &canonical_path)?;

        if let Some(fragment) = cache.get(&canonical_path) {
            self.check_size(path, fragment.size_bytes)?;
            tracing::trace!("Cache hit");
            return Ok(LoadedFragment {
                fragment,
                cache_hit: true,
            });
        }

        let file = File::open(&canonical_path).map_err(|source| LoadError::from_io(path, source))?;
        let metadata = file
            .metadata()
            .map_err(|source| LoadError::from_io(path, source))?;
        if !metadata.is_file() {
            return Err(LoadError::NotAFile {
                path: path.to_path_buf(),
            });
        }
        self.check_size(path, metadata.len())?;

        let start = Instant::now();
        let bytes = self.read_capped(path, file)?;
        let value = Format::from_path(path)
            .parse(&bytes)
            .map_err(|message| LoadError::Parse {
                path: path.to_path_buf(),
                message,
            })?;
        let content = Node::from(value);
        let load_time = start.elapsed();

        let fragment = CachedFragment {
            content,
            size_bytes: bytes.len() as u64,
            load_time,
            fingerprint: format!("{:x}", Sha256::digest(&bytes)),
            canonical_path: canonical_path.clone(),
        };
        tracing::debug!(
            "Loaded {} ({} bytes in {:?})",
            path.display(),
            fragment.size_bytes,
            load_time
        );

        Ok(LoadedFragment {
            fragment: cache.insert(canonical_path, fragment),
            cache_hit: false,
        })
    }

    /// Reads at most `max_file_size` bytes, failing if the source holds more.
    ///
    /// The stat'ed size is not trusted, since the file may grow between the
    /// stat and the read.
    fn read_capped(&self, path: &Path, source: impl Read) -> Result<Vec<u8>, LoadError> {
        let mut bytes = Vec::new();
        source
            .take(self.max_file_size.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|source| LoadError::from_io(path, source))?;
        self.check_size(path, bytes.len() as u64)?;
        Ok(bytes)
    }

    fn check_size(&self, path: &Path, size: u64) -> Result<(), LoadError> {
        if size > self.max_file_size {
            return Err(LoadError::TooLarge {
                path: path.to_path_buf(),
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    fn check_confined(&self, path: &Path, canonical_path: &Path) -> Result<(), LoadError> {
        match &self.canonical_root {
            Some(root) if !canonical_path.starts_with(root) || canonical_path == root.as_path() => {
                Err(LoadError::Escape {
                    path: path.to_path_buf(),
                    target: canonical_path.to_path_buf(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Errors that can occur when loading a fragment.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file does not exist.
    #[error("file does not exist: {}", path.display())]
    NotFound {
        /// The path that was looked up.
        path: PathBuf,
    },

    /// The path exists but is not a regular file.
    #[error("not a regular file: {}", path.display())]
    NotAFile {
        /// The path that was looked up.
        path: PathBuf,
    },

    /// The file resolves outside the root directory through a symlink.
    #[error("{} resolves to {}, outside the root directory", path.display(), target.display())]
    Escape {
        /// The path that was looked up.
        path: PathBuf,
        /// Where it actually points.
        target: PathBuf,
    },

    /// The file exceeds the maximum size.
    #[error("{} is {size} bytes, exceeding the maximum of {max} bytes", path.display())]
    TooLarge {
        /// The oversized file.
        path: PathBuf,
        /// Its size in bytes.
        size: u64,
        /// The configured maximum.
        max: u64,
    },

    /// The file content could not be parsed.
    #[error("failed to parse {}: {message}", path.display())]
    Parse {
        /// The offending file.
        path: PathBuf,
        /// The parser's message.
        message: String,
    },

    /// Any other I/O failure.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The file being read.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
}

impl LoadError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound {
                path: path.to_path_buf(),
            },
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    /// The diagnostic kind for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::NotAFile { .. } => ErrorKind::FileNotFound,
            Self::Escape { .. } => ErrorKind::PathEscapeRejected,
            Self::TooLarge { .. } => ErrorKind::FileTooLarge,
            Self::Parse { .. } => ErrorKind::ParseError,
            Self::Io { .. } => ErrorKind::IoError,
        }
    }

    /// The path the error concerns.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound { path }
            | Self::NotAFile { path }
            | Self::Escape { path, .. }
            | Self::TooLarge { path, .. }
            | Self::Parse { path, .. }
            | Self::Io { path, .. } => path,
        }
    }
}
