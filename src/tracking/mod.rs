//! Tracking of a directory tree over time.
//!
//! # Architecture
//!
//! - [`crate::tracking::PathFilter`] - Decides which directories and files are tracked
//! - [`crate::tracking::TreeEnumerator`] - Walks the tree yielding `(path, mtime)` pairs
//! - [`crate::tracking::Manifest`] - Persists and reloads a snapshot of the tree
//!
//! # Usage
//!
//! ```no_run
//! use pathmanifest::tracking::{FilterRules, Manifest};
//! use std::path::Path;
//!
//! # fn main() -> pathmanifest::Result<()> {
//! let rules = FilterRules::new().exclude("logs").include("app");
//! let manifest = Manifest::new(Path::new("/srv/site"), &rules, false)?;
//!
//! // Snapshot now, read it back later
//! manifest.write(false)?;
//! let entries = manifest.read()?;
//! # Ok(())
//! # }
//! ```

pub mod filter;
pub mod manifest;
pub mod scanner;

pub use filter::{DirDecision, FilterRules, PathFilter, PrefixMatch};
pub use manifest::{Manifest, ManifestEntry};
pub use scanner::TreeEnumerator;
