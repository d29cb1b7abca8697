//! Three-way comparison of a manifest against the live tree.
//!
//! Paths are classified as created (live only), updated (both, mtime
//! differs) or removed (manifest only). Unchanged paths are dropped. The
//! comparison runs in time linear in the size of both inputs.

use crate::error::{PatchError, Result};
use crate::tracking::{Manifest, ManifestEntry};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{Level, debug, span};

/// Paths keyed to mtimes.
pub type PathTimes = BTreeMap<String, i64>;

/// Disjoint change sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// Present now, absent from the manifest (live mtime)
    pub created: PathTimes,
    /// Present in both with a different mtime (live mtime)
    pub updated: PathTimes,
    /// Present in the manifest, absent now (manifest mtime)
    pub removed: PathTimes,
}

impl DiffResult {
    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Total number of changed paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.removed.len()
    }

    /// Sorted union of created and updated paths, i.e. what a patch must carry.
    #[must_use]
    pub fn changed_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .created
            .keys()
            .chain(self.updated.keys())
            .cloned()
            .collect();
        paths.sort_unstable();
        paths
    }
}

/// Result of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    /// At least one path differs
    Changed(DiffResult),
    /// The tree matches the manifest
    Unchanged,
}

impl DiffOutcome {
    /// Converts [`DiffOutcome::Unchanged`] into [`PatchError::NoChangedFiles`].
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::NoChangedFiles`] for an unchanged tree.
    pub fn into_result(self) -> Result<DiffResult> {
        match self {
            Self::Changed(diff) => Ok(diff),
            Self::Unchanged => Err(PatchError::NoChangedFiles),
        }
    }
}

/// Compare manifest entries against live entries.
pub fn compare<M, L>(manifest: M, live: L) -> DiffOutcome
where
    M: IntoIterator<Item = ManifestEntry>,
    L: IntoIterator<Item = ManifestEntry>,
{
    let mut recorded: HashSet<(i64, String)> = manifest
        .into_iter()
        .map(|entry| (entry.mtime, entry.path))
        .collect();

    // Live entries without an exact (mtime, path) match in the manifest.
    let mut unknown: HashMap<String, i64> = HashMap::new();
    for entry in live {
        let key = (entry.mtime, entry.path);
        if !recorded.remove(&key) {
            let (mtime, path) = key;
            unknown.insert(path, mtime);
        }
    }

    let mut diff = DiffResult::default();
    for (recorded_mtime, path) in recorded {
        match unknown.remove(&path) {
            Some(live_mtime) => {
                diff.updated.insert(path, live_mtime);
            }
            None => {
                diff.removed.insert(path, recorded_mtime);
            }
        }
    }
    diff.created.extend(unknown);

    if diff.is_empty() {
        DiffOutcome::Unchanged
    } else {
        DiffOutcome::Changed(diff)
    }
}

/// Compare a manifest's snapshot against its live tree.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be read or the tree cannot be walked.
pub fn compare_tree(manifest: &Manifest) -> Result<DiffOutcome> {
    let span = span!(Level::DEBUG, "compare", root = %manifest.root().display());
    let _guard = span.enter();

    let recorded = manifest.read()?;
    let live = manifest.live_entries()?;
    let outcome = compare(recorded, live);

    match &outcome {
        DiffOutcome::Changed(diff) => debug!(
            created = diff.created.len(),
            updated = diff.updated.len(),
            removed = diff.removed.len(),
            "Comparison complete"
        ),
        DiffOutcome::Unchanged => debug!("No changes detected"),
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(items: &[(&str, i64)]) -> Vec<ManifestEntry> {
        items
            .iter()
            .map(|(path, mtime)| ManifestEntry::new(*path, *mtime))
            .collect()
    }

    fn times(items: &[(&str, i64)]) -> PathTimes {
        items.iter().map(|(p, t)| ((*p).to_string(), *t)).collect()
    }

    #[test]
    fn test_created_and_updated() {
        let outcome = compare(
            entries(&[("a", 1), ("b", 2)]),
            entries(&[("a", 1), ("b", 3), ("c", 4)]),
        );
        let diff = outcome.into_result().unwrap();

        assert_eq!(diff.created, times(&[("c", 4)]));
        assert_eq!(diff.updated, times(&[("b", 3)]));
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn test_removed_keeps_recorded_mtime() {
        let outcome = compare(entries(&[("a", 1), ("gone", 7)]), entries(&[("a", 1)]));
        let diff = outcome.into_result().unwrap();

        assert_eq!(diff.removed, times(&[("gone", 7)]));
        assert!(diff.created.is_empty());
        assert!(diff.updated.is_empty());
    }

    #[test]
    fn test_unchanged() {
        let outcome = compare(entries(&[("a", 1), ("b", 2)]), entries(&[("b", 2), ("a", 1)]));
        assert_eq!(outcome, DiffOutcome::Unchanged);
        assert!(matches!(
            outcome.into_result(),
            Err(PatchError::NoChangedFiles)
        ));
    }

    #[test]
    fn test_empty_inputs_are_unchanged() {
        let none: Vec<ManifestEntry> = Vec::new();
        assert_eq!(compare(none.clone(), none), DiffOutcome::Unchanged);
    }

    #[test]
    fn test_older_mtime_counts_as_update() {
        let diff = compare(entries(&[("a", 10)]), entries(&[("a", 5)]))
            .into_result()
            .unwrap();
        assert_eq!(diff.updated, times(&[("a", 5)]));
    }

    #[test]
    fn test_changed_paths_sorted_union() {
        let diff = DiffResult {
            created: times(&[("z", 1), ("b", 1)]),
            updated: times(&[("m", 2)]),
            removed: times(&[("a", 3)]),
        };
        assert_eq!(diff.changed_paths(), vec!["b", "m", "z"]);
        assert_eq!(diff.len(), 4);
    }
}
