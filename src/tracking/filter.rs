//! Include/exclude rules deciding which parts of a tree are tracked.
//!
//! Rules are relative, `/`-separated path prefixes. A directory is pruned
//! when it falls under an excluded prefix. When an include set is present a
//! directory is visited only if it lies under an included prefix (its files
//! are processed) or is an ancestor of one (visited to reach deeper, its own
//! files are skipped).
//!
//! Prefix comparison is segment-bounded by default, so `app` covers
//! `app/src` but not `application`. [`PrefixMatch::Textual`] restores plain
//! string-prefix matching for trees whose rules relied on it.

use crate::{ARCHIVE_GLOB, MANIFEST_FILENAME, PATCH_INFO_GLOB};
use serde::{Deserialize, Serialize};

/// How rule prefixes are compared with paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefixMatch {
    /// Prefix must end on a path separator boundary.
    #[default]
    Segment,
    /// Plain string prefix (`app` also matches `application`).
    Textual,
}

impl PrefixMatch {
    /// Whether `path` is equal to or below `prefix`.
    #[must_use]
    pub fn is_under(self, path: &str, prefix: &str) -> bool {
        match self {
            Self::Textual => path.starts_with(prefix),
            Self::Segment => {
                prefix.is_empty()
                    || path == prefix
                    || (path.starts_with(prefix)
                        && path.as_bytes().get(prefix.len()) == Some(&b'/'))
            }
        }
    }
}

/// User-supplied filtering rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRules {
    /// Directory prefixes whose subtrees are never visited
    #[serde(default)]
    pub excluded_paths: Vec<String>,
    /// When non-empty, only these subtrees are tracked
    #[serde(default)]
    pub included_paths: Vec<String>,
    /// File path prefixes that are never tracked
    #[serde(default)]
    pub excluded_file_paths: Vec<String>,
    /// Prefix comparison mode
    #[serde(default)]
    pub prefix_match: PrefixMatch,
}

impl FilterRules {
    /// Rules that track everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an excluded directory prefix.
    #[must_use]
    pub fn exclude(mut self, path: impl Into<String>) -> Self {
        self.excluded_paths.push(path.into());
        self
    }

    /// Adds an included directory prefix.
    #[must_use]
    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.included_paths.push(path.into());
        self
    }

    /// Adds an excluded file prefix.
    #[must_use]
    pub fn exclude_file(mut self, path: impl Into<String>) -> Self {
        self.excluded_file_paths.push(path.into());
        self
    }

    /// Sets the prefix comparison mode.
    #[must_use]
    pub const fn with_prefix_match(mut self, mode: PrefixMatch) -> Self {
        self.prefix_match = mode;
        self
    }
}

/// Outcome of evaluating a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirDecision {
    /// Descend into the directory
    pub visit_subtree: bool,
    /// Yield the files directly inside it
    pub process_files: bool,
}

impl DirDecision {
    const SKIP: Self = Self {
        visit_subtree: false,
        process_files: false,
    };
}

/// Pure decision function over relative paths.
#[derive(Debug, Clone)]
pub struct PathFilter {
    excluded: Vec<String>,
    included: Vec<String>,
    excluded_files: Vec<String>,
    mode: PrefixMatch,
    metadata_pattern: glob::Pattern,
    archive_pattern: glob::Pattern,
}

impl PathFilter {
    /// Builds a filter, normalising rule entries (`./a/b/` becomes `a/b`).
    #[must_use]
    pub fn new(rules: &FilterRules) -> Self {
        let excluded = normalize_all(&rules.excluded_paths, true);
        let excluded_files = normalize_all(&rules.excluded_file_paths, true);
        let included = normalize_all(&rules.included_paths, false);

        Self {
            excluded,
            included,
            excluded_files,
            mode: rules.prefix_match,
            metadata_pattern: glob::Pattern::new(PATCH_INFO_GLOB).unwrap_or_default(),
            archive_pattern: glob::Pattern::new(ARCHIVE_GLOB).unwrap_or_default(),
        }
    }

    /// Decides whether a directory (relative to the root, `""` for the root
    /// itself) is descended into and whether its own files are processed.
    #[must_use]
    pub fn decide_dir(&self, rel_dir: &str) -> DirDecision {
        if !rel_dir.is_empty()
            && self
                .excluded
                .iter()
                .any(|prefix| self.mode.is_under(rel_dir, prefix))
        {
            return DirDecision::SKIP;
        }

        if self.included.is_empty() {
            return DirDecision {
                visit_subtree: true,
                process_files: true,
            };
        }

        if self
            .included
            .iter()
            .any(|prefix| self.mode.is_under(rel_dir, prefix))
        {
            return DirDecision {
                visit_subtree: true,
                process_files: true,
            };
        }

        if self
            .included
            .iter()
            .any(|prefix| self.mode.is_under(prefix, rel_dir))
        {
            return DirDecision {
                visit_subtree: true,
                process_files: false,
            };
        }

        DirDecision::SKIP
    }

    /// Decides whether a file is tracked. `rel_path` is relative to the root.
    #[must_use]
    pub fn accepts_file(&self, rel_path: &str) -> bool {
        let (parent, file_name) = match rel_path.rsplit_once('/') {
            Some((parent, name)) => (parent, name),
            None => ("", rel_path),
        };

        if parent.is_empty() && is_snapshot_name(file_name) {
            tracing::debug!(path = rel_path, "excluding manifest snapshot");
            return false;
        }

        if self.is_patch_metadata(file_name) {
            tracing::debug!(path = rel_path, "excluding patch metadata");
            return false;
        }

        // Archives written into the tree must not ship inside the next patch.
        if self.archive_pattern.matches(file_name) {
            tracing::debug!(path = rel_path, "excluding patch archive");
            return false;
        }

        if self
            .excluded_files
            .iter()
            .any(|prefix| self.mode.is_under(rel_path, prefix))
        {
            return false;
        }

        let decision = self.decide_dir(parent);
        if decision.process_files {
            return true;
        }

        // An include rule may name a single file inside an otherwise
        // unprocessed ancestor directory.
        decision.visit_subtree && self.included.iter().any(|inc| inc == rel_path)
    }

    /// Whether a bare file name is a patch metadata document.
    #[must_use]
    pub fn is_patch_metadata(&self, file_name: &str) -> bool {
        self.metadata_pattern.matches(file_name)
    }
}

/// The snapshot itself or a temporary file left by an interrupted write.
fn is_snapshot_name(file_name: &str) -> bool {
    file_name == MANIFEST_FILENAME
        || file_name
            .strip_prefix(MANIFEST_FILENAME)
            .is_some_and(|rest| rest.starts_with('.'))
}

fn normalize_all(entries: &[String], drop_empty: bool) -> Vec<String> {
    entries
        .iter()
        .map(|entry| normalize_rule(entry))
        .filter(|entry| !(drop_empty && entry.is_empty()))
        .collect()
}

/// Strips `./` prefixes and trailing separators, unifies separators to `/`.
#[must_use]
pub fn normalize_rule(entry: &str) -> String {
    let unified = entry.replace('\\', "/");
    let mut trimmed = unified.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    if trimmed == "." {
        return String::new();
    }
    trimmed.trim_end_matches('/').to_string()
}
