//! Patch metadata document.
//!
//! One [`PatchInfo`] is written per patch. It travels at the top level of the
//! archive and is later deposited into the tree as a history record. The
//! document is indented JSON with keys in sorted order so successive patches
//! diff cleanly.

use crate::error::{IoResultExt, PatchError, Result};
use crate::utils::serialization;
use crate::{ARCHIVE_PREFIX, PATCH_INFO_GLOB, PATCH_INFO_PREFIX, TIMESTAMP_FORMAT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Per-file record. Fields are declared in key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchFileRecord {
    /// Size in bytes at staging time
    pub filesize_b: u64,
    /// Lowercase hex MD5 of the content at staging time
    pub hash_md5: String,
    /// Whole-second mtime at staging time
    pub mtime_epoch: i64,
}

/// Patch metadata. Fields are declared in key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchInfo {
    /// Local creation time formatted with [`TIMESTAMP_FORMAT`]
    pub created_timestamp: String,
    /// Files carried by the patch keyed by relative path
    pub files: BTreeMap<String, PatchFileRecord>,
    /// Name the patch was built under
    pub patch_name: String,
}

impl PatchInfo {
    /// New metadata stamped with the current local time.
    pub fn new(patch_name: impl Into<String>, files: BTreeMap<String, PatchFileRecord>) -> Self {
        Self {
            created_timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            files,
            patch_name: patch_name.into(),
        }
    }

    /// File name of this document.
    #[must_use]
    pub fn filename(&self) -> String {
        patch_info_filename(&self.patch_name)
    }

    /// Encode as an indented, key-sorted JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::MalformedMetadata`] if encoding fails.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serialization::to_pretty_json(self).map_err(|source| PatchError::MalformedMetadata {
            source_name: self.filename(),
            source,
        })
    }

    /// Decode a document; `source_name` is used in error messages.
    ///
    /// Documents come from archives built elsewhere, so the patch name and
    /// every file key are checked before anything acts on them.
    ///
    /// # Errors
    ///
    /// - [`PatchError::MalformedMetadata`] if the bytes do not parse or a file
    ///   key escapes the tree
    /// - [`PatchError::InvalidPatchName`] if the recorded name is invalid
    pub fn from_json(bytes: &[u8], source_name: &str) -> Result<Self> {
        let malformed = |source| PatchError::MalformedMetadata {
            source_name: source_name.to_string(),
            source,
        };

        let info: Self = serialization::from_json(bytes).map_err(malformed)?;
        validate_patch_name(&info.patch_name)?;

        if let Some(bad) = info.files.keys().find(|key| !is_tree_relative(key)) {
            return Err(malformed(serde::de::Error::custom(format!(
                "file path {bad:?} is not relative to the tree"
            ))));
        }
        Ok(info)
    }

    /// Read a document from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn read_from(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_path(path)?;
        Self::from_json(&bytes, &path.display().to_string())
    }

    /// Write the document into `dir` under its templated name.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(self.filename());
        std::fs::write(&path, self.to_json()?).with_path(&path)?;
        Ok(path)
    }
}

/// Name of the metadata document for `patch_name`.
#[must_use]
pub fn patch_info_filename(patch_name: &str) -> String {
    format!("{PATCH_INFO_PREFIX}{patch_name}")
}

/// Whether `name` is a bare metadata document name (no directory part).
#[must_use]
pub fn is_patch_info_name(name: &str) -> bool {
    !name.contains('/')
        && glob::Pattern::new(PATCH_INFO_GLOB).is_ok_and(|pattern| pattern.matches(name))
}

/// Relative, `/`-separated and free of `..` segments.
fn is_tree_relative(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && !path.contains('\\')
        && !Path::new(path).is_absolute()
        && path.split('/').all(|segment| !segment.is_empty() && segment != "..")
}

/// Name of the archive for `patch_name` with the archiver's `extension`.
#[must_use]
pub fn archive_filename(patch_name: &str, extension: &str) -> String {
    format!("{ARCHIVE_PREFIX}{patch_name}.{extension}")
}

/// Patch names are non-empty runs of ASCII letters, digits and underscores.
///
/// # Errors
///
/// Returns [`PatchError::InvalidPatchName`] otherwise.
pub fn validate_patch_name(name: &str) -> Result<()> {
    if !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        Ok(())
    } else {
        Err(PatchError::InvalidPatchName(name.to_string()))
    }
}
