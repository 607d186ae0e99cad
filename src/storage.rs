mod cache;
/// Lexical validation of reference paths.
pub mod guard;
/// Reading and parsing fragment files.
pub mod loader;

pub use cache::{CachedFragment, ResolutionCache};
pub use guard::{ApprovedPath, PathGuard, Rejection};
pub use loader::{Format, FragmentLoader, LoadError, LoadedFragment};
