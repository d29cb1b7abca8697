use crate::PatchContext;
use crate::patch::{AppliedPatches, list_applied_patches};
use anyhow::{Context, Result};
use colored::Colorize;

/// List the patches recorded in the root.
///
/// # Errors
///
/// Returns an error if the root is missing or a recorded document is invalid.
pub fn execute(ctx: &PatchContext, files_only: bool) -> Result<AppliedPatches> {
    let applied = list_applied_patches(ctx.root())
        .with_context(|| format!("Failed to read patch history in {}", ctx.root().display()))?;

    if applied.patches.is_empty() {
        super::print_info("No patches have been applied");
        return Ok(applied);
    }

    if files_only {
        for path in &applied.files {
            println!("{path}");
        }
        return Ok(applied);
    }

    for info in &applied.patches {
        println!(
            "{} {} ({} file(s))",
            info.patch_name.yellow().bold(),
            info.created_timestamp.dimmed(),
            info.files.len()
        );
    }
    println!();
    println!("{}", "Files changed by patches:".bold());
    for path in &applied.files {
        println!("    {path}");
    }

    Ok(applied)
}
