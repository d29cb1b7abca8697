use crate::PatchContext;
use crate::patch::record_applied;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Record a patch archive as applied by depositing its metadata in the root.
///
/// # Errors
///
/// Returns an error if the archive cannot be read or the root is not writable.
pub fn execute(ctx: &PatchContext, archive: &Path) -> Result<PathBuf> {
    let info = super::read_patch::load(ctx, archive)?;
    let recorded = record_applied(ctx.root(), &info)
        .with_context(|| format!("Failed to record patch {}", info.patch_name))?;

    super::print_success(&format!(
        "Recorded patch {} ({} file(s))",
        info.patch_name,
        info.files.len()
    ));
    Ok(recorded)
}
