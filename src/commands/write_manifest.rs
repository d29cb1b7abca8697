use crate::PatchContext;
use crate::cli::FilterArgs;
use crate::commands::context::CommandContext;
use crate::output;
use anyhow::{Context, Result};

/// Write a fresh manifest for the root.
///
/// # Errors
///
/// Returns an error if the root is missing, a manifest already exists and
/// `force` is not set, or the snapshot cannot be written.
pub fn execute(ctx: &PatchContext, filter: &FilterArgs, force: bool) -> Result<()> {
    let manifest = ctx.open_manifest(filter)?;
    output::verbose(&format!("Enumerating {}", manifest.root().display()));

    let path = manifest
        .write(force)
        .context("Failed to write manifest")?;

    super::print_success(&format!("Manifest written to {}", path.display()));
    Ok(())
}
