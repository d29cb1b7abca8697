//! Reading patches back.
//!
//! Metadata is pulled out of an archive without unpacking the rest of it.
//! Applied patches leave their metadata document in the root directory, which
//! is the durable history of what patches have touched.

use crate::error::{IoResultExt, PatchError, Result};
use crate::patch::archiver::Archiver;
use crate::patch::info::{PatchInfo, is_patch_info_name};
use crate::tracking::scanner::resolve_relative;
use crate::utils::hash;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, span};

/// Extract the [`PatchInfo`] carried by `archive_path`.
///
/// # Errors
///
/// - [`PatchError::AmbiguousMetadata`] unless exactly one top-level entry
///   matches the metadata name pattern
/// - [`PatchError::ArchiveFailed`] if the archive cannot be read
/// - [`PatchError::MalformedMetadata`] if the entry does not parse
pub fn extract_patch_info(archiver: &dyn Archiver, archive_path: &Path) -> Result<PatchInfo> {
    let span = span!(Level::DEBUG, "read_patch", archive = %archive_path.display());
    let _guard = span.enter();

    let mut matches: Vec<String> = archiver
        .list(archive_path)?
        .into_iter()
        .filter(|name| is_patch_info_name(name))
        .collect();

    if matches.len() != 1 {
        return Err(PatchError::AmbiguousMetadata {
            archive: archive_path.to_path_buf(),
            matches,
        });
    }

    let entry = matches.remove(0);
    debug!(entry = %entry, "Found patch metadata");
    let bytes = archiver.extract_entry(archive_path, &entry)?;
    PatchInfo::from_json(&bytes, &format!("{}:{entry}", archive_path.display()))
}

/// Patches recorded in a root directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedPatches {
    /// Recorded documents ordered by file name
    pub patches: Vec<PatchInfo>,
    /// Union of every path the patches carried
    pub files: BTreeSet<String>,
}

/// Read every metadata document in `root` (non-recursive).
///
/// # Errors
///
/// Returns [`PatchError::RootNotFound`] for a missing root, or an error if a
/// document cannot be read or parsed.
pub fn list_applied_patches(root: &Path) -> Result<AppliedPatches> {
    if !root.is_dir() {
        return Err(PatchError::RootNotFound(root.to_path_buf()));
    }

    let mut documents: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(root).with_path(root)? {
        let entry = entry.with_path(root)?;
        let is_file = entry.file_type().with_path(entry.path())?.is_file();
        if is_file && entry.file_name().to_str().is_some_and(is_patch_info_name) {
            documents.push(entry.path());
        }
    }
    documents.sort();

    let mut applied = AppliedPatches::default();
    for path in documents {
        let info = PatchInfo::read_from(&path)?;
        applied.files.extend(info.files.keys().cloned());
        applied.patches.push(info);
    }

    debug!(
        patches = applied.patches.len(),
        files = applied.files.len(),
        "Listed applied patches"
    );
    Ok(applied)
}

/// Current MD5 of every file the patch carries.
///
/// # Errors
///
/// Returns [`PatchError::Io`] if a referenced file is missing or unreadable.
pub fn verify_hashes(root: &Path, info: &PatchInfo) -> Result<BTreeMap<String, String>> {
    info.files
        .keys()
        .map(|rel| -> Result<(String, String)> {
            Ok((rel.clone(), hash::hash_file(&resolve_relative(root, rel))?))
        })
        .collect()
}

/// One file's recorded and current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashCheck {
    /// Hash recorded when the patch was built
    pub recorded: String,
    /// Hash of the file now, `None` if it no longer exists
    pub current: Option<String>,
}

impl HashCheck {
    /// Whether the file still matches the recorded content.
    #[must_use]
    pub fn matches(&self) -> bool {
        self.current.as_deref() == Some(self.recorded.as_str())
    }
}

/// Drift report for one patch against a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashReport {
    /// Per-file checks keyed by relative path
    pub checks: BTreeMap<String, HashCheck>,
}

impl HashReport {
    /// Compare recorded hashes with the files under `root`. Missing files are
    /// reported rather than treated as errors.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read.
    pub fn build(root: &Path, info: &PatchInfo) -> Result<Self> {
        let mut checks = BTreeMap::new();
        for (rel, record) in &info.files {
            let path = resolve_relative(root, rel);
            let current = if path.is_file() {
                Some(hash::hash_file(&path)?)
            } else {
                None
            };
            checks.insert(
                rel.clone(),
                HashCheck {
                    recorded: record.hash_md5.clone(),
                    current,
                },
            );
        }
        Ok(Self { checks })
    }

    /// Paths whose content no longer matches.
    #[must_use]
    pub fn drifted(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|(_, check)| !check.matches())
            .map(|(path, _)| path.as_str())
            .collect()
    }

    /// Whether every file matches.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.checks.values().all(HashCheck::matches)
    }
}

/// Deposit `info` into `root` so it shows up in [`list_applied_patches`].
///
/// # Errors
///
/// Returns [`PatchError::RootNotFound`] for a missing root or an I/O error.
pub fn record_applied(root: &Path, info: &PatchInfo) -> Result<PathBuf> {
    if !root.is_dir() {
        return Err(PatchError::RootNotFound(root.to_path_buf()));
    }
    let path = info.write_to_dir(root)?;
    debug!(path = %path.display(), "Recorded applied patch");
    Ok(path)
}
