use crate::PatchContext;
use crate::commands::context::CommandContext;
use crate::patch::{PatchInfo, extract_patch_info};
use crate::utils::format_size;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

/// Print the metadata carried by a patch archive.
///
/// # Errors
///
/// Returns an error if the archive cannot be read or holds no single
/// metadata document.
pub fn execute(ctx: &PatchContext, archive: &Path, json: bool) -> Result<PatchInfo> {
    let info = load(ctx, archive)?;

    if json {
        print!("{}", String::from_utf8_lossy(&info.to_json()?));
        return Ok(info);
    }

    println!("{} {}", "patch".yellow(), info.patch_name.yellow().bold());
    println!("Created: {}", info.created_timestamp);
    println!("Files:   {}", info.files.len());
    println!();
    for (path, record) in &info.files {
        println!(
            "    {}  {:>10}  {}",
            record.hash_md5.dimmed(),
            format_size(record.filesize_b),
            path
        );
    }

    Ok(info)
}

/// Extract the metadata of `archive` with an archiver able to read it.
///
/// # Errors
///
/// Returns an error if the archive cannot be read.
pub fn load(ctx: &PatchContext, archive: &Path) -> Result<PatchInfo> {
    let archiver = ctx.archiver_for(archive)?;
    extract_patch_info(archiver.as_ref(), archive)
        .with_context(|| format!("Failed to read patch {}", archive.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::patch::{Archiver, NativeTar};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_read_native_archive() -> Result<()> {
        let temp = TempDir::new()?;
        let info = PatchInfo::new("r1", BTreeMap::new());
        info.write_to_dir(temp.path())?;
        let archive = temp.path().join("deploy-patch-r1.tar.zst");
        NativeTar::new(3).create(&archive, temp.path(), &[info.filename()])?;

        let ctx = PatchContext::new_explicit(temp.path().to_path_buf(), Config::default());
        assert_eq!(execute(&ctx, &archive, true)?, info);
        Ok(())
    }
}
