//! Manifest snapshot of a tree.
//!
//! A manifest records every tracked file's relative path and whole-second
//! mtime at a point in time. It lives inside the root it describes as a
//! zstd-compressed CSV file, one `relative_path,mtime_epoch` row per file.
//! Row order follows enumeration order but readers must treat the result as a
//! set.

use crate::MANIFEST_FILENAME;
use crate::error::{IoResultExt, PatchError, Result};
use crate::tracking::filter::FilterRules;
use crate::tracking::scanner::TreeEnumerator;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Compression level used for snapshot files.
const SNAPSHOT_COMPRESSION_LEVEL: i32 = 3;

/// One tracked file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the root, `/`-separated
    pub path: String,
    /// Modification time, truncated to whole seconds since the epoch
    pub mtime: i64,
}

impl ManifestEntry {
    /// Convenience constructor.
    pub fn new(path: impl Into<String>, mtime: i64) -> Self {
        Self {
            path: path.into(),
            mtime,
        }
    }
}

/// A tree bound to its on-disk snapshot file.
#[derive(Debug, Clone)]
pub struct Manifest {
    enumerator: TreeEnumerator,
    snapshot_path: PathBuf,
}

impl Manifest {
    /// Bind a manifest to `root`.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::RootNotFound`] if `root` does not exist.
    pub fn new(root: &Path, rules: &FilterRules, follow_symlinks: bool) -> Result<Self> {
        let enumerator = TreeEnumerator::new(root, rules, follow_symlinks)?;
        let snapshot_path = enumerator.root().join(MANIFEST_FILENAME);

        Ok(Self {
            enumerator,
            snapshot_path,
        })
    }

    /// Absolute root of the tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.enumerator.root()
    }

    /// Location of the snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Whether a snapshot has been written.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.snapshot_path.exists()
    }

    /// Enumerate the live tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the walk fails.
    pub fn live_entries(&self) -> Result<Vec<ManifestEntry>> {
        self.enumerator.collect_entries()
    }

    /// Snapshot the live tree to disk and return the snapshot path.
    ///
    /// The tree is fully enumerated before anything is written; the snapshot
    /// is then written to a temporary file in the root and renamed into
    /// place.
    ///
    /// # Errors
    ///
    /// - [`PatchError::AlreadyExists`] if a snapshot exists and `force` is false
    /// - [`PatchError::ManifestWrite`] or [`PatchError::Io`] on write failures
    pub fn write(&self, force: bool) -> Result<PathBuf> {
        if self.exists() && !force {
            return Err(PatchError::AlreadyExists(self.snapshot_path.clone()));
        }

        let entries = self.live_entries()?;
        self.write_entries(&entries)?;

        info!(
            path = %self.snapshot_path.display(),
            count = entries.len(),
            "Wrote manifest"
        );
        Ok(self.snapshot_path.clone())
    }

    fn write_entries(&self, entries: &[ManifestEntry]) -> Result<()> {
        let root = self.root();
        let temp = tempfile::Builder::new()
            .prefix(&format!("{MANIFEST_FILENAME}."))
            .tempfile_in(root)
            .with_path(root)?;

        {
            let encoder =
                zstd::Encoder::new(BufWriter::new(temp.as_file()), SNAPSHOT_COMPRESSION_LEVEL)
                    .with_path(temp.path())?;
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(encoder);

            for entry in entries {
                writer
                    .write_record([entry.path.as_str(), &entry.mtime.to_string()])
                    .map_err(PatchError::ManifestWrite)?;
            }

            writer.flush().with_path(temp.path())?;
            let encoder = writer
                .into_inner()
                .map_err(|e| PatchError::io(temp.path(), std::io::Error::other(e.to_string())))?;
            let mut inner = encoder.finish().with_path(temp.path())?;
            inner.flush().with_path(temp.path())?;
        }

        temp.persist(&self.snapshot_path)
            .map_err(|e| PatchError::io(&self.snapshot_path, e.error))?;
        Ok(())
    }

    /// Read the snapshot back.
    ///
    /// # Errors
    ///
    /// - [`PatchError::ManifestNotFound`] if no snapshot exists
    /// - [`PatchError::Corrupt`] if it cannot be decoded or repeats a path
    pub fn read(&self) -> Result<Vec<ManifestEntry>> {
        read_snapshot(&self.snapshot_path)
    }
}

/// Decode a snapshot file.
///
/// # Errors
///
/// See [`Manifest::read`].
pub fn read_snapshot(path: &Path) -> Result<Vec<ManifestEntry>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PatchError::ManifestNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(PatchError::io(path, e)),
    };

    let corrupt = |reason: String| PatchError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    let decoder = zstd::Decoder::new(BufReader::new(file)).map_err(|e| corrupt(e.to_string()))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(decoder);

    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for record in reader.deserialize::<(String, i64)>() {
        let (rel_path, mtime) = record.map_err(|e| corrupt(e.to_string()))?;
        if !seen.insert(rel_path.clone()) {
            return Err(corrupt(format!("duplicate path {rel_path:?}")));
        }
        entries.push(ManifestEntry::new(rel_path, mtime));
    }

    debug!(path = %path.display(), count = entries.len(), "Read manifest");
    Ok(entries)
}
