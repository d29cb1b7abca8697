use anyhow::{Context, Result};
use std::path::Path;

use crate::PatchContext;
use crate::cli::FilterArgs;
use crate::patch::{ArchiveBackend, Archiver, BuildOptions, NativeTar, build_archiver};
use crate::tracking::{FilterRules, Manifest};

/// Trait providing common operations for command modules
pub trait CommandContext {
    /// Configured filter rules extended with per-invocation flags
    fn filter_rules(&self, extra: &FilterArgs) -> FilterRules;

    /// Opens the manifest of the root with the effective filter rules
    ///
    /// # Errors
    ///
    /// Returns an error if the root does not exist
    fn open_manifest(&self, extra: &FilterArgs) -> Result<Manifest>;

    /// The configured archiver
    ///
    /// # Errors
    ///
    /// Returns an error if the archiver is unavailable
    fn archiver(&self) -> Result<Box<dyn Archiver>>;

    /// Archiver able to read `archive`, chosen by its extension
    ///
    /// # Errors
    ///
    /// Returns an error if the archiver is unavailable
    fn archiver_for(&self, archive: &Path) -> Result<Box<dyn Archiver>>;

    /// Build options with an optional per-invocation limit (0 disables it)
    fn build_options(&self, max_files: Option<usize>) -> BuildOptions;
}

impl CommandContext for PatchContext {
    fn filter_rules(&self, extra: &FilterArgs) -> FilterRules {
        let mut rules = self.config.filter.rules.clone();
        rules.excluded_paths.extend(extra.exclude.iter().cloned());
        rules.included_paths.extend(extra.include.iter().cloned());
        rules
            .excluded_file_paths
            .extend(extra.exclude_file.iter().cloned());
        rules
    }

    fn open_manifest(&self, extra: &FilterArgs) -> Result<Manifest> {
        let rules = self.filter_rules(extra);
        Manifest::new(&self.root, &rules, self.config.filter.follow_symlinks)
            .with_context(|| format!("Cannot track {}", self.root.display()))
    }

    fn archiver(&self) -> Result<Box<dyn Archiver>> {
        let archive = &self.config.archive;
        build_archiver(
            archive.backend,
            &archive.tar_binary,
            archive.compression_level,
        )
        .context("Failed to set up archiver")
    }

    fn archiver_for(&self, archive: &Path) -> Result<Box<dyn Archiver>> {
        let native = NativeTar::new(self.config.archive.compression_level);
        let is_native = archive
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(&format!(".{}", native.extension())));

        if is_native {
            Ok(Box::new(native))
        } else if self.config.archive.backend == ArchiveBackend::Native {
            // Anything else is left to the external tar.
            build_archiver(
                ArchiveBackend::TarCommand,
                &self.config.archive.tar_binary,
                self.config.archive.compression_level,
            )
            .context("Failed to set up archiver")
        } else {
            self.archiver()
        }
    }

    fn build_options(&self, max_files: Option<usize>) -> BuildOptions {
        let limit = match max_files {
            Some(0) => None,
            Some(n) => Some(n),
            None => self.config.max_files(),
        };
        BuildOptions {
            max_files: limit,
            retain_staging: self.debug(),
        }
    }
}
