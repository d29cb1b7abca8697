#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]
// Allow pedantic strict lints that create false positives in this codebase
#![allow(clippy::arithmetic_side_effects)] // Simple counters and size calculations cannot overflow
#![allow(clippy::float_arithmetic)] // Required for file size formatting
#![allow(clippy::indexing_slicing)] // Bounds checked by logic

//! # pathmanifest - Directory Snapshots and Incremental Patches
//!
//! pathmanifest records which files exist under a directory tree together
//! with their modification times, reports how the tree changed since, and
//! packs the created and updated files into a patch archive that carries
//! verifiable metadata (size, mtime and MD5 per file).
//!
//! ## Features
//!
//! - **Filtered enumeration**: include/exclude directory prefixes and excluded file prefixes
//! - **Compressed manifests**: snapshots are zstd-compressed CSV written atomically
//! - **Linear-time diff**: created / updated / removed classification over hash sets
//! - **Self-describing patches**: a JSON metadata document travels inside every archive
//! - **Pluggable archivers**: system `tar` (bzip2) or in-process tar + zstd
//!
//! ## Architecture
//!
//! - [`tracking`]: Path filter, tree enumerator and manifest store
//! - [`diff`]: Manifest versus live tree comparison
//! - [`patch`]: Patch builder, archivers, metadata and reader
//! - [`config`]: Configuration parsing and validation
//! - [`commands`]: Command implementations for the `pm` binary
//! - [`output`]: Output formatting and styling
//! - [`utils`]: Utility functions and helpers
//!
//! ## Example Usage
//!
//! ```no_run
//! use pathmanifest::diff::{DiffOutcome, compare_tree};
//! use pathmanifest::tracking::{FilterRules, Manifest};
//! use std::path::Path;
//!
//! # fn main() -> pathmanifest::Result<()> {
//! let rules = FilterRules::new().exclude("logs");
//! let manifest = Manifest::new(Path::new("/srv/site"), &rules, false)?;
//! manifest.write(false)?;
//!
//! // ... the tree changes ...
//!
//! if let DiffOutcome::Changed(diff) = compare_tree(&manifest)? {
//!     println!("{} files changed", diff.len());
//! }
//! # Ok(())
//! # }
//! ```

/// Command-line interface definitions (argument parsing structures).
pub mod cli;

/// Commands module containing all CLI command implementations.
pub mod commands;

/// Configuration parsing, validation, and management.
pub mod config;

/// Comparison of a manifest against the live tree.
pub mod diff;

/// Error types for the core library.
pub mod error;

/// Output formatting and styling.
pub mod output;

/// Patch building, archiving and inspection.
pub mod patch;

/// Tracking of a directory tree: filtering, enumeration and snapshots.
pub mod tracking;

/// Utility functions and helpers.
pub mod utils;

pub use error::{PatchError, Result};

use anyhow::Context;
use std::path::{Path, PathBuf};

/// Current version of the pm binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file path relative to home directory.
pub const DEFAULT_CONFIG_PATH: &str = ".config/pathmanifest/config";

/// Name of the manifest snapshot kept in the root of a tracked tree.
pub const MANIFEST_FILENAME: &str = ".manifest.csv.zst";

/// Prefix of patch metadata documents; the patch name follows it.
pub const PATCH_INFO_PREFIX: &str = ".deploy_patch_info.";

/// Glob matching any patch metadata document name.
pub const PATCH_INFO_GLOB: &str = ".deploy_patch_info.*";

/// Prefix of patch archive names; the patch name and extension follow it.
pub const ARCHIVE_PREFIX: &str = "deploy-patch-";

/// Glob matching any patch archive name.
pub const ARCHIVE_GLOB: &str = "deploy-patch-*.tar.*";

/// Local time format of `created_timestamp` in patch metadata.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Largest patch allowed unless configured otherwise.
pub const DEFAULT_MAX_FILES: usize = 1000;

/// Central context for all pm operations.
///
/// Holds the tracked root and the configuration resolved once at startup.
/// Components receive what they need from here explicitly; nothing reads the
/// environment after the context is built.
///
/// # Examples
///
/// ```no_run
/// use pathmanifest::PatchContext;
/// use pathmanifest::config::Config;
///
/// # fn main() -> anyhow::Result<()> {
/// // Context with the user's configuration
/// let ctx = PatchContext::new("/srv/site".into(), None)?;
///
/// // Context with explicit settings (for testing)
/// let ctx = PatchContext::new_explicit("/srv/site".into(), Config::default());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PatchContext {
    /// Root of the tracked tree.
    pub root: PathBuf,

    /// Path the configuration was loaded from (may not exist).
    pub config_path: PathBuf,

    /// Loaded configuration settings.
    pub config: config::Config,
}

impl PatchContext {
    /// Creates a context for `root`, loading configuration from
    /// `config_path` or the default location and applying environment
    /// overrides.
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined, or the
    /// configuration cannot be read, parsed or validated.
    pub fn new(root: PathBuf, config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path wins over PM_CONFIG_PATH and the home directory
        let config_path = match config_path {
            Some(path) => path,
            None => default_config_path()?,
        };

        let mut config = config::Config::load(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;

        // Warn about keys that have no effect
        let validator = config::validator::ConfigValidator::new();
        if let Err(e) = validator.validate_config_file(&config_path) {
            eprintln!("Warning: Configuration validation failed: {e}");
        }

        Ok(Self {
            root,
            config_path,
            config,
        })
    }

    /// Creates a context with an explicit configuration.
    #[must_use]
    pub fn new_explicit(root: PathBuf, config: config::Config) -> Self {
        Self {
            root,
            config_path: PathBuf::new(),
            config,
        }
    }

    /// Root of the tracked tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether debug behaviour is on.
    #[must_use]
    pub const fn debug(&self) -> bool {
        self.config.core.debug
    }
}

/// Configuration path from `PM_CONFIG_PATH` or the home directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("PM_CONFIG_PATH") {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(DEFAULT_CONFIG_PATH))
}
