//! Tree enumerator yielding `(relative_path, mtime)` pairs.
//!
//! The walk is top-down and consults the [`PathFilter`] before descending so
//! excluded subtrees are never stat'ed. Iteration is lazy; calling
//! [`TreeEnumerator::entries`] again re-walks the tree from scratch.

use crate::error::{PatchError, Result};
use crate::tracking::filter::{FilterRules, PathFilter};
use crate::tracking::manifest::ManifestEntry;
use filetime::FileTime;
use std::path::{Component, Path, PathBuf};
use tracing::{Level, debug, span};
use walkdir::{DirEntry, WalkDir};

/// Walks a root directory under a set of filter rules.
#[derive(Debug, Clone)]
pub struct TreeEnumerator {
    /// Absolute root of the tree
    root: PathBuf,
    /// Compiled filter rules
    filter: PathFilter,
    /// Whether to follow symbolic links
    follow_symlinks: bool,
}

impl TreeEnumerator {
    /// Create an enumerator for `root`.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::RootNotFound`] if `root` does not exist.
    pub fn new(root: &Path, rules: &FilterRules, follow_symlinks: bool) -> Result<Self> {
        if !root.is_dir() {
            return Err(PatchError::RootNotFound(root.to_path_buf()));
        }
        let root = std::path::absolute(root).map_err(|e| PatchError::io(root, e))?;

        Ok(Self {
            root,
            filter: PathFilter::new(rules),
            follow_symlinks,
        })
    }

    /// Absolute root path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a fresh walk.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::RootNotFound`] if the root has disappeared since
    /// the enumerator was created.
    pub fn entries(&self) -> Result<Entries<'_>> {
        if !self.root.is_dir() {
            return Err(PatchError::RootNotFound(self.root.clone()));
        }

        let root = self.root.as_path();
        let filter = &self.filter;
        let predicate: EntryPredicate<'_> = Box::new(move |entry: &DirEntry| {
            if entry.depth() == 0 {
                return true;
            }
            // Unrepresentable paths are let through so the iterator reports them.
            let Some(rel) = relative_path(root, entry.path()) else {
                return true;
            };
            if entry.file_type().is_dir() {
                filter.decide_dir(&rel).visit_subtree
            } else {
                filter.accepts_file(&rel)
            }
        });

        let walker = WalkDir::new(root)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(predicate);

        Ok(Entries { walker, root })
    }

    /// Walk the whole tree into a vector.
    ///
    /// # Errors
    ///
    /// Returns the first error hit during the walk.
    pub fn collect_entries(&self) -> Result<Vec<ManifestEntry>> {
        let span = span!(Level::DEBUG, "enumerate", root = %self.root.display());
        let _guard = span.enter();

        let entries = self.entries()?.collect::<Result<Vec<_>>>()?;
        debug!(count = entries.len(), "Enumeration complete");
        Ok(entries)
    }
}

/// Boxed `filter_entry` predicate borrowing the enumerator.
type EntryPredicate<'a> = Box<dyn FnMut(&DirEntry) -> bool + 'a>;

/// Lazy sequence of tracked files.
pub struct Entries<'a> {
    walker: walkdir::FilterEntry<walkdir::IntoIter, EntryPredicate<'a>>,
    root: &'a Path,
}

impl Entries<'_> {
    fn to_manifest_entry(&self, entry: &DirEntry) -> Result<ManifestEntry> {
        let path = relative_path(self.root, entry.path())
            .ok_or_else(|| PatchError::InvalidPath(entry.path().to_path_buf()))?;
        let metadata = entry.metadata()?;
        let mtime = FileTime::from_last_modification_time(&metadata).unix_seconds();

        Ok(ManifestEntry { path, mtime })
    }
}

impl Iterator for Entries<'_> {
    type Item = Result<ManifestEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };

            if entry.file_type().is_file() {
                return Some(self.to_manifest_entry(&entry));
            }
        }
    }
}

/// Render `path` relative to `root` with `/` separators.
///
/// Returns `None` when `path` is not below `root` or contains non-UTF-8
/// components.
#[must_use]
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Resolve a `/`-separated relative path below `root`.
#[must_use]
pub fn resolve_relative(root: &Path, rel: &str) -> PathBuf {
    rel.split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |acc, part| acc.join(part))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use filetime::set_file_mtime;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_structure(root: &Path) -> Result<()> {
        // root/
        //   app/
        //     src/main.rs
        //     src/util/mod.rs
        //     README
        //   cache/blob
        //   top.txt
        fs::create_dir_all(root.join("app/src/util"))?;
        fs::create_dir_all(root.join("cache"))?;
        fs::write(root.join("app/src/main.rs"), "fn main() {}")?;
        fs::write(root.join("app/src/util/mod.rs"), "")?;
        fs::write(root.join("app/README"), "readme")?;
        fs::write(root.join("cache/blob"), "blob")?;
        fs::write(root.join("top.txt"), "top")?;
        Ok(())
    }

    fn paths(entries: &[ManifestEntry]) -> HashSet<&str> {
        entries.iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn test_enumerate_all_files() -> Result<()> {
        let temp = TempDir::new()?;
        create_test_structure(temp.path())?;

        let enumerator = TreeEnumerator::new(temp.path(), &FilterRules::new(), false)?;
        let entries = enumerator.collect_entries()?;

        assert_eq!(
            paths(&entries),
            HashSet::from([
                "app/src/main.rs",
                "app/src/util/mod.rs",
                "app/README",
                "cache/blob",
                "top.txt",
            ])
        );
        Ok(())
    }

    #[test]
    fn test_enumerate_respects_rules() -> Result<()> {
        let temp = TempDir::new()?;
        create_test_structure(temp.path())?;

        let rules = FilterRules::new().include("app/src").exclude("app/src/util");
        let enumerator = TreeEnumerator::new(temp.path(), &rules, false)?;
        let entries = enumerator.collect_entries()?;

        assert_eq!(paths(&entries), HashSet::from(["app/src/main.rs"]));
        Ok(())
    }

    #[test]
    fn test_mtime_is_whole_seconds() -> Result<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("f.txt");
        fs::write(&file, "x")?;
        set_file_mtime(&file, FileTime::from_unix_time(1_500_000_000, 999_000_000))?;

        let enumerator = TreeEnumerator::new(temp.path(), &FilterRules::new(), false)?;
        let entries = enumerator.collect_entries()?;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].mtime, 1_500_000_000);
        Ok(())
    }

    #[test]
    fn test_enumeration_is_repeatable() -> Result<()> {
        let temp = TempDir::new()?;
        create_test_structure(temp.path())?;

        let enumerator = TreeEnumerator::new(temp.path(), &FilterRules::new(), false)?;
        let first = enumerator.collect_entries()?;
        let second = enumerator.collect_entries()?;

        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_missing_root() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");
        let err = TreeEnumerator::new(&missing, &FilterRules::new(), false).unwrap_err();
        assert!(matches!(err, PatchError::RootNotFound(_)));
    }

    #[test]
    fn test_root_removed_after_creation() -> Result<()> {
        let temp = TempDir::new()?;
        let root = temp.path().join("tree");
        fs::create_dir(&root)?;
        let enumerator = TreeEnumerator::new(&root, &FilterRules::new(), false)?;
        fs::remove_dir(&root)?;

        assert!(matches!(
            enumerator.entries(),
            Err(PatchError::RootNotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn test_relative_path_helpers() {
        let root = Path::new("/srv/app");
        assert_eq!(
            relative_path(root, Path::new("/srv/app/a/b.txt")).as_deref(),
            Some("a/b.txt")
        );
        assert_eq!(relative_path(root, Path::new("/srv/other")), None);
        assert_eq!(
            resolve_relative(root, "a/b.txt"),
            PathBuf::from("/srv/app/a/b.txt")
        );
    }
}
