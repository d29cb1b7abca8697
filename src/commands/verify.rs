use crate::PatchContext;
use crate::patch::info::is_patch_info_name;
use crate::patch::{HashReport, PatchInfo};
use anyhow::{Context, Result, bail};
use colored::Colorize;
use std::path::Path;

/// Compare the files of a patch against the root. `patch` is an archive or a
/// bare metadata document.
///
/// # Errors
///
/// Returns an error if the patch cannot be read or any file has drifted.
pub fn execute(ctx: &PatchContext, patch: &Path) -> Result<HashReport> {
    let info = load_info(ctx, patch)?;
    let report = HashReport::build(ctx.root(), &info)
        .with_context(|| format!("Failed to hash files under {}", ctx.root().display()))?;

    for (path, check) in &report.checks {
        if check.matches() {
            println!("{}  {path}", "ok".green());
        } else if check.current.is_none() {
            println!("{}  {path}", "missing".red().bold());
        } else {
            println!("{}  {path}", "changed".yellow().bold());
        }
    }

    let drifted = report.drifted();
    if !drifted.is_empty() {
        bail!(
            "{} of {} file(s) from patch {} no longer match",
            drifted.len(),
            report.checks.len(),
            info.patch_name
        );
    }

    super::print_success(&format!("All files of patch {} match", info.patch_name));
    Ok(report)
}

fn load_info(ctx: &PatchContext, patch: &Path) -> Result<PatchInfo> {
    let is_document = patch
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(is_patch_info_name);

    if is_document {
        PatchInfo::read_from(patch).with_context(|| format!("Failed to read {}", patch.display()))
    } else {
        super::read_patch::load(ctx, patch)
    }
}
