use crate::PatchContext;
use crate::cli::FilterArgs;
use crate::commands::context::CommandContext;
use crate::output;
use crate::patch::{BuildOutcome, BuiltPatch, PatchBuilder};
use crate::utils::format_size;
use anyhow::{Result, bail};
use std::path::Path;

/// Build a patch of everything changed since the manifest was written.
/// Returns the built patch, or `None` when nothing changed.
///
/// # Errors
///
/// Returns an error if the patch exceeds the file limit, the name is invalid,
/// or staging or archiving fails.
pub fn execute(
    ctx: &PatchContext,
    name: &str,
    filter: &FilterArgs,
    output_dir: &Path,
    max_files: Option<usize>,
) -> Result<Option<BuiltPatch>> {
    let manifest = ctx.open_manifest(filter)?;
    let archiver = ctx.archiver()?;
    let options = ctx.build_options(max_files);

    let outcome = PatchBuilder::new(&manifest, archiver.as_ref(), options).build(name, output_dir)?;

    match outcome {
        BuildOutcome::Built(patch) => {
            for (path, record) in &patch.info.files {
                output::verbose(&format!("  {path} ({})", format_size(record.filesize_b)));
            }
            if !patch.diff.removed.is_empty() {
                super::print_warning(&format!(
                    "{} removed file(s) are not carried by the patch",
                    patch.diff.removed.len()
                ));
            }
            super::print_success(&format!(
                "Created {} with {} file(s)",
                patch.archive_path.display(),
                patch.info.files.len()
            ));
            Ok(Some(patch))
        }
        BuildOutcome::NoChangedFiles => {
            super::print_info("No files have changed; no patch written");
            Ok(None)
        }
        BuildOutcome::TooManyFiles { count, limit } => {
            bail!(
                "Patch would contain {count} files, exceeding the limit of {limit}. \
                 Narrow the filter rules or raise --max-files."
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::patch::ArchiveBackend;
    use tempfile::TempDir;

    fn ctx(root: &Path) -> PatchContext {
        let mut config = Config::default();
        config.archive.backend = ArchiveBackend::Native;
        PatchContext::new_explicit(root.to_path_buf(), config)
    }

    #[test]
    fn test_make_patch_flow() -> Result<()> {
        let temp = TempDir::new()?;
        let root = temp.path().join("tree");
        std::fs::create_dir(&root)?;
        std::fs::write(root.join("a.txt"), "a")?;
        let ctx = ctx(&root);
        let filter = FilterArgs::default();
        ctx.open_manifest(&filter)?.write(false)?;

        let out = temp.path().join("out");
        assert!(execute(&ctx, "none", &filter, &out, None)?.is_none());

        std::fs::write(root.join("b.txt"), "b")?;
        std::fs::write(root.join("c.txt"), "c")?;
        assert!(execute(&ctx, "big", &filter, &out, Some(1)).is_err());
        assert!(!out.join("deploy-patch-big.tar.zst").exists());

        let patch = execute(&ctx, "small", &filter, &out, None)?
            .ok_or_else(|| anyhow::anyhow!("expected a patch"))?;
        assert_eq!(patch.archive_path, out.join("deploy-patch-small.tar.zst"));
        assert_eq!(patch.info.files.len(), 2);
        Ok(())
    }
}
