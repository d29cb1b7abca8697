//! Patch assembly.
//!
//! Building a patch compares the manifest against the live tree, copies the
//! created and updated files into a scratch staging directory, records their
//! size/mtime/hash in a [`PatchInfo`] and packs the staged files plus that
//! document into one archive.
//!
//! The tree is assumed not to change while a patch is built. If it does, the
//! copy and hash of a file are taken from whatever is on disk at that moment
//! and filesystem errors abort the build.

use crate::diff::{DiffOutcome, DiffResult, compare_tree};
use crate::error::{IoResultExt, PatchError, Result};
use crate::patch::archiver::Archiver;
use crate::patch::info::{PatchFileRecord, PatchInfo, archive_filename, validate_patch_name};
use crate::tracking::Manifest;
use crate::tracking::scanner::resolve_relative;
use crate::utils::{hash, paths};
use filetime::FileTime;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{Level, debug, info, span, warn};

/// Knobs for a single build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Refuse patches with more files than this
    pub max_files: Option<usize>,
    /// Keep the staging directory for inspection
    pub retain_staging: bool,
}

/// A successfully written patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPatch {
    /// Location of the archive
    pub archive_path: PathBuf,
    /// Metadata embedded in the archive
    pub info: PatchInfo,
    /// Comparison the patch was built from
    pub diff: DiffResult,
}

/// Result of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Archive written
    Built(BuiltPatch),
    /// The tree matches the manifest; nothing was staged or archived
    NoChangedFiles,
    /// The limit was exceeded; nothing was archived
    TooManyFiles {
        /// Files that would have been staged
        count: usize,
        /// Configured limit
        limit: usize,
    },
}

impl BuildOutcome {
    /// Maps the non-success outcomes onto their [`PatchError`] variants.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::NoChangedFiles`] or [`PatchError::TooManyFiles`].
    pub fn into_result(self) -> Result<BuiltPatch> {
        match self {
            Self::Built(patch) => Ok(patch),
            Self::NoChangedFiles => Err(PatchError::NoChangedFiles),
            Self::TooManyFiles { count, limit } => Err(PatchError::TooManyFiles { count, limit }),
        }
    }
}

/// Scratch directory removed on drop unless retention was requested.
struct StagingDir {
    dir: Option<TempDir>,
    path: PathBuf,
    retain: bool,
}

impl StagingDir {
    fn new(retain: bool) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("pm-stage-")
            .tempdir()
            .with_path(std::env::temp_dir())?;
        let path = dir.path().to_path_buf();
        debug!(path = %path.display(), "Created staging directory");

        Ok(Self {
            dir: Some(dir),
            path,
            retain,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if self.retain {
                let kept = dir.keep();
                warn!(path = %kept.display(), "Not removing staging directory in debug mode");
            } else if let Err(e) = dir.close() {
                warn!(path = %self.path.display(), error = %e, "Failed to remove staging directory");
            }
        }
    }
}

/// Builds patches for one manifest.
pub struct PatchBuilder<'a> {
    manifest: &'a Manifest,
    archiver: &'a dyn Archiver,
    options: BuildOptions,
}

impl<'a> PatchBuilder<'a> {
    /// Create a builder.
    #[must_use]
    pub fn new(manifest: &'a Manifest, archiver: &'a dyn Archiver, options: BuildOptions) -> Self {
        Self {
            manifest,
            archiver,
            options,
        }
    }

    /// Build `patch_name` into `output_dir`.
    ///
    /// # Errors
    ///
    /// - [`PatchError::InvalidPatchName`] for a bad name
    /// - manifest read and tree walk errors
    /// - [`PatchError::Io`] while staging files
    /// - [`PatchError::ArchiveFailed`] if the archiver fails
    pub fn build(&self, patch_name: &str, output_dir: &Path) -> Result<BuildOutcome> {
        validate_patch_name(patch_name)?;

        let span = span!(Level::INFO, "build_patch", name = patch_name);
        let _guard = span.enter();

        let staging = StagingDir::new(self.options.retain_staging)?;

        let diff = match compare_tree(self.manifest)? {
            DiffOutcome::Changed(diff) => diff,
            DiffOutcome::Unchanged => return Ok(BuildOutcome::NoChangedFiles),
        };

        // Removals alone leave nothing to ship.
        let changed = diff.changed_paths();
        if changed.is_empty() {
            return Ok(BuildOutcome::NoChangedFiles);
        }

        if let Some(limit) = self.options.max_files
            && changed.len() > limit
        {
            warn!(count = changed.len(), limit, "Patch exceeds file limit");
            return Ok(BuildOutcome::TooManyFiles {
                count: changed.len(),
                limit,
            });
        }

        debug!(files = ?changed, "Files to capture in the patch");

        let mut files = BTreeMap::new();
        for rel in &changed {
            let record = self.stage_file(rel, staging.path())?;
            files.insert(rel.clone(), record);
        }

        let info = PatchInfo::new(patch_name, files);
        info.write_to_dir(staging.path())?;

        let output_dir = paths::make_absolute(output_dir)?;
        fs::create_dir_all(&output_dir).with_path(&output_dir)?;
        let archive_path = output_dir.join(archive_filename(patch_name, self.archiver.extension()));

        let mut members = changed;
        members.push(info.filename());
        self.archiver.create(&archive_path, staging.path(), &members)?;

        info!(
            archive = %archive_path.display(),
            files = info.files.len(),
            "Patch built"
        );

        Ok(BuildOutcome::Built(BuiltPatch {
            archive_path,
            info,
            diff,
        }))
    }

    /// Copy one file into the stage, keep its mtime and hash the live source.
    fn stage_file(&self, rel: &str, stage: &Path) -> Result<PatchFileRecord> {
        let from = resolve_relative(self.manifest.root(), rel);
        let to = resolve_relative(stage, rel);
        debug!(from = %from.display(), to = %to.display(), "Staging file");

        paths::ensure_parent_dirs(&to)?;
        fs::copy(&from, &to).with_path(&from)?;

        let metadata = fs::metadata(&from).with_path(&from)?;
        let mtime = FileTime::from_last_modification_time(&metadata).unix_seconds();
        filetime::set_file_mtime(&to, FileTime::from_unix_time(mtime, 0)).with_path(&to)?;

        Ok(PatchFileRecord {
            filesize_b: metadata.len(),
            hash_md5: hash::hash_file(&from)?,
            mtime_epoch: mtime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::archiver::NativeTar;
    use crate::tracking::FilterRules;
    use anyhow::Result;

    fn setup() -> Result<(tempfile::TempDir, Manifest)> {
        let temp = tempfile::TempDir::new()?;
        let root = temp.path().join("tree");
        fs::create_dir_all(root.join("conf"))?;
        fs::write(root.join("conf/app.ini"), "v1")?;
        fs::write(root.join("index.html"), "<html>")?;
        filetime::set_file_mtime(root.join("conf/app.ini"), FileTime::from_unix_time(1000, 0))?;
        filetime::set_file_mtime(root.join("index.html"), FileTime::from_unix_time(1000, 0))?;

        let manifest = Manifest::new(&root, &FilterRules::new(), false)?;
        manifest.write(false)?;
        Ok((temp, manifest))
    }

    #[test]
    fn test_unchanged_tree_builds_nothing() -> Result<()> {
        let (temp, manifest) = setup()?;
        let archiver = NativeTar::new(3);
        let out = temp.path().join("out");

        let outcome = PatchBuilder::new(&manifest, &archiver, BuildOptions::default())
            .build("p1", &out)?;

        assert_eq!(outcome, BuildOutcome::NoChangedFiles);
        assert!(!out.exists());
        Ok(())
    }

    #[test]
    fn test_build_records_changed_files() -> Result<()> {
        let (temp, manifest) = setup()?;
        let root = manifest.root().to_path_buf();
        fs::write(root.join("conf/app.ini"), "v2 longer")?;
        filetime::set_file_mtime(root.join("conf/app.ini"), FileTime::from_unix_time(2000, 0))?;
        fs::write(root.join("new.txt"), "new")?;

        let archiver = NativeTar::new(3);
        let patch = PatchBuilder::new(&manifest, &archiver, BuildOptions::default())
            .build("p1", &temp.path().join("out"))?
            .into_result()?;

        assert!(patch.archive_path.ends_with("deploy-patch-p1.tar.zst"));
        assert_eq!(
            patch.info.files.keys().collect::<Vec<_>>(),
            vec!["conf/app.ini", "new.txt"]
        );
        let record = &patch.info.files["conf/app.ini"];
        assert_eq!(record.mtime_epoch, 2000);
        assert_eq!(record.filesize_b, 9);
        assert_eq!(record.hash_md5, hash::hash_bytes(b"v2 longer"));

        let mut entries = archiver.list(&patch.archive_path)?;
        entries.sort();
        assert_eq!(
            entries,
            vec![".deploy_patch_info.p1", "conf/app.ini", "new.txt"]
        );
        Ok(())
    }

    #[test]
    fn test_limit_blocks_archive() -> Result<()> {
        let (temp, manifest) = setup()?;
        let root = manifest.root().to_path_buf();
        fs::write(root.join("a.txt"), "a")?;
        fs::write(root.join("b.txt"), "b")?;

        let archiver = NativeTar::new(3);
        let out = temp.path().join("out");
        let options = BuildOptions {
            max_files: Some(1),
            retain_staging: false,
        };
        let outcome = PatchBuilder::new(&manifest, &archiver, options).build("p1", &out)?;

        assert_eq!(outcome, BuildOutcome::TooManyFiles { count: 2, limit: 1 });
        assert!(!out.join("deploy-patch-p1.tar.zst").exists());
        assert!(matches!(
            outcome.into_result(),
            Err(PatchError::TooManyFiles { count: 2, limit: 1 })
        ));
        Ok(())
    }

    #[test]
    fn test_removal_only_builds_nothing() -> Result<()> {
        let (temp, manifest) = setup()?;
        fs::remove_file(manifest.root().join("index.html"))?;

        let archiver = NativeTar::new(3);
        let out = temp.path().join("out");
        let outcome = PatchBuilder::new(&manifest, &archiver, BuildOptions::default())
            .build("cleanup", &out)?;

        assert_eq!(outcome, BuildOutcome::NoChangedFiles);
        assert!(!out.exists());
        Ok(())
    }

    #[test]
    fn test_invalid_name_rejected_before_work()-> Result<()> {
        let (temp, manifest) = setup()?;
        let archiver = NativeTar::new(3);
        let err = PatchBuilder::new(&manifest, &archiver, BuildOptions::default())
            .build("bad name", &temp.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, PatchError::InvalidPatchName(_)));
        Ok(())
    }

    #[test]
    fn test_staging_dir_cleanup_and_retention() -> Result<()> {
        let removed = {
            let staging = StagingDir::new(false)?;
            staging.path().to_path_buf()
        };
        assert!(!removed.exists());

        let kept = {
            let staging = StagingDir::new(true)?;
            staging.path().to_path_buf()
        };
        assert!(kept.exists());
        fs::remove_dir_all(&kept)?;
        Ok(())
    }
}
