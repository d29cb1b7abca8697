use crate::PatchContext;
use crate::cli::FilterArgs;
use crate::commands::context::CommandContext;
use crate::diff::{DiffOutcome, DiffResult, compare_tree};
use crate::output::{ChangeKind, change_line};
use anyhow::Result;

/// Report changes since the manifest was written. Returns whether anything
/// changed.
///
/// # Errors
///
/// Returns an error if the manifest cannot be read or the tree cannot be walked.
pub fn execute(ctx: &PatchContext, filter: &FilterArgs) -> Result<bool> {
    let manifest = ctx.open_manifest(filter)?;

    match compare_tree(&manifest)? {
        DiffOutcome::Unchanged => {
            super::print_info("No changes since the manifest was written");
            Ok(false)
        }
        DiffOutcome::Changed(diff) => {
            for line in render(&diff) {
                println!("{line}");
            }
            Ok(true)
        }
    }
}

/// One line per changed path, ordered by path.
fn render(diff: &DiffResult) -> Vec<String> {
    let mut rows: Vec<(&str, ChangeKind)> = diff
        .created
        .keys()
        .map(|p| (p.as_str(), ChangeKind::Created))
        .chain(diff.updated.keys().map(|p| (p.as_str(), ChangeKind::Updated)))
        .chain(diff.removed.keys().map(|p| (p.as_str(), ChangeKind::Removed)))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));

    rows.into_iter()
        .map(|(path, kind)| change_line(kind, path))
        .collect()
}
