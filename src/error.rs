//! Error taxonomy for the manifest, diff and patch engine.
//!
//! Every condition surfaces to the immediate caller. Nothing here is retried
//! or swallowed; the CLI reports the message and exits non-zero.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by the core library.
#[derive(Error, Debug)]
pub enum PatchError {
    /// The root directory did not exist when the operation started.
    #[error("Root path does not exist: {}", .0.display())]
    RootNotFound(PathBuf),

    /// A manifest snapshot is already present and `force` was not given.
    #[error("Manifest already exists: {} (use --force to overwrite)", .0.display())]
    AlreadyExists(PathBuf),

    /// No manifest snapshot was found in the root.
    #[error("Manifest not found: {}", .0.display())]
    ManifestNotFound(PathBuf),

    /// The manifest snapshot could not be decoded.
    #[error("Manifest is corrupt: {}: {reason}", .path.display())]
    Corrupt {
        /// Snapshot file that failed to decode
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// The live tree matches the manifest exactly.
    #[error("No files have changed since the manifest was written")]
    NoChangedFiles,

    /// The patch would contain more files than the configured limit allows.
    #[error("Patch would contain {count} files, exceeding the limit of {limit}")]
    TooManyFiles {
        /// Number of files that would have been staged
        count: usize,
        /// Configured maximum
        limit: usize,
    },

    /// The archiver did not complete successfully.
    #[error("Archive operation failed: {0}")]
    ArchiveFailed(String),

    /// The archiver could not be located or started.
    #[error("Archiver unavailable: {0}")]
    ArchiverUnavailable(String),

    /// An archive did not contain exactly one patch metadata entry.
    #[error(
        "Expected exactly one patch metadata entry in {}, found {}",
        .archive.display(),
        .matches.len()
    )]
    AmbiguousMetadata {
        /// Archive that was inspected
        archive: PathBuf,
        /// Entries matching the metadata filename pattern
        matches: Vec<String>,
    },

    /// A patch metadata document could not be parsed or written.
    #[error("Malformed patch metadata in {source_name}: {source}")]
    MalformedMetadata {
        /// File or archive entry the document came from
        source_name: String,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Patch names are restricted to ASCII letters, digits and underscores.
    #[error("Invalid patch name: {0:?} (allowed: letters, digits and '_')")]
    InvalidPatchName(String),

    /// A path inside the tree could not be represented as a relative UTF-8 path.
    #[error("Unsupported path in tree: {}", .0.display())]
    InvalidPath(PathBuf),

    /// Filesystem failure on a specific path.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failure.
    #[error("Failed to walk tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// Manifest rows could not be written.
    #[error("Failed to write manifest: {0}")]
    ManifestWrite(#[source] csv::Error),
}

impl PatchError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, PatchError>;

/// Attaches a path to `std::io::Result` failures.
pub trait IoResultExt<T> {
    /// Converts the error into [`PatchError::Io`] for `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::Io`] when `self` is an error.
    fn with_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| PatchError::io(path, e))
    }
}
