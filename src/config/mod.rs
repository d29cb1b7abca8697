pub mod validator;

use crate::DEFAULT_MAX_FILES;
use crate::patch::ArchiveBackend;
use crate::tracking::FilterRules;
use crate::tracking::filter::normalize_rule;
use crate::utils::parse_truthy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding the debug flag.
pub const ENV_DEBUG: &str = "PM_DEBUG";

/// Environment variable overriding the file-count limit.
pub const ENV_MAX_FILES: &str = "PM_MAX_FILES";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub core: CoreConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub archive: ArchiveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoreConfig {
    /// Verbose diagnostics and staging directory retention
    #[serde(default)]
    pub debug: bool,
    /// Largest patch allowed, 0 disables the limit
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct FilterConfig {
    #[serde(flatten)]
    pub rules: FilterRules,
    #[serde(default)]
    pub follow_symlinks: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub backend: ArchiveBackend,
    #[serde(default = "default_tar_binary")]
    pub tar_binary: String,
    /// zstd level used by the native backend
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            debug: false,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            backend: ArchiveBackend::default(),
            tar_binary: default_tar_binary(),
            compression_level: default_compression_level(),
        }
    }
}

impl Config {
    /// Load configuration from a file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file exists but cannot be read
    /// - The file contains invalid TOML
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Apply `PM_DEBUG` / `PM_MAX_FILES` from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparseable value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_DEBUG) {
            self.core.debug = parse_truthy(&value)
                .with_context(|| format!("Invalid boolean in {ENV_DEBUG}: {value}"))?;
        }
        if let Some(value) = lookup(ENV_MAX_FILES) {
            self.core.max_files = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid number in {ENV_MAX_FILES}: {value}"))?;
        }
        Ok(())
    }

    /// Check values serde cannot reject on its own.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if !(1..=22).contains(&self.archive.compression_level) {
            return Err(anyhow::anyhow!(
                "Compression level must be between 1 and 22"
            ));
        }
        if self.archive.tar_binary.trim().is_empty() {
            return Err(anyhow::anyhow!("archive.tar_binary must not be empty"));
        }

        let rules = &self.filter.rules;
        for (key, entries) in [
            ("filter.excluded_paths", &rules.excluded_paths),
            ("filter.included_paths", &rules.included_paths),
            ("filter.excluded_file_paths", &rules.excluded_file_paths),
        ] {
            for entry in entries {
                if Path::new(entry).is_absolute() || entry.starts_with('/') {
                    return Err(anyhow::anyhow!(
                        "{key} entries must be relative to the root: {entry}"
                    ));
                }
                if normalize_rule(entry).is_empty() && key != "filter.included_paths" {
                    return Err(anyhow::anyhow!("{key} contains an empty entry"));
                }
            }
        }
        Ok(())
    }

    /// File-count limit, `None` when disabled.
    #[must_use]
    pub const fn max_files(&self) -> Option<usize> {
        match self.core.max_files {
            0 => None,
            n => Some(n),
        }
    }
}

// Default functions for serde
const fn default_max_files() -> usize {
    DEFAULT_MAX_FILES
}

fn default_tar_binary() -> String {
    "tar".to_string()
}

const fn default_compression_level() -> i32 {
    3
}
