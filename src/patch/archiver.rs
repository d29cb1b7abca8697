//! Archive backends.
//!
//! The patch engine only needs three operations from an archive format:
//! create one from an explicit file list, list its entries, and pull a
//! single entry into memory. [`TarCommand`] shells out to a system `tar`
//! (bzip2-compressed archives); [`NativeTar`] writes zstd-compressed tar
//! archives in-process.

use crate::error::{PatchError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{Level, debug, span};

/// Capability needed to package and inspect patches.
pub trait Archiver {
    /// File extension without the leading dot, e.g. `tar.bz2`.
    fn extension(&self) -> &str;

    /// Create `archive_path` from `files`, given relative to `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::ArchiveFailed`] if the archive cannot be written.
    fn create(&self, archive_path: &Path, base_dir: &Path, files: &[String]) -> Result<()>;

    /// Entry names stored in the archive.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::ArchiveFailed`] if the archive cannot be read.
    fn list(&self, archive_path: &Path) -> Result<Vec<String>>;

    /// Content of a single entry.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::ArchiveFailed`] if the archive cannot be read or
    /// lacks the entry.
    fn extract_entry(&self, archive_path: &Path, entry: &str) -> Result<Vec<u8>>;
}

/// Selects an [`Archiver`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveBackend {
    /// External `tar` binary producing `.tar.bz2`
    #[default]
    TarCommand,
    /// In-process tar writer producing `.tar.zst`
    Native,
}

/// Construct the archiver selected by `backend`.
///
/// # Errors
///
/// Returns [`PatchError::ArchiverUnavailable`] if the tar binary cannot be found.
pub fn build_archiver(
    backend: ArchiveBackend,
    tar_binary: &str,
    compression_level: i32,
) -> Result<Box<dyn Archiver>> {
    match backend {
        ArchiveBackend::TarCommand => Ok(Box::new(TarCommand::locate(tar_binary)?)),
        ArchiveBackend::Native => Ok(Box::new(NativeTar::new(compression_level))),
    }
}

/// Strip the `./` some tar implementations prefix entry names with.
fn normalize_entry_name(name: &str) -> String {
    let mut name = name.trim_end_matches(['\r', '\n']);
    while let Some(rest) = name.strip_prefix("./") {
        name = rest;
    }
    name.to_string()
}

/// System `tar` driven as a subprocess.
#[derive(Debug, Clone)]
pub struct TarCommand {
    program: PathBuf,
}

impl TarCommand {
    /// Resolve `binary` on `PATH` (or accept it as a path).
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::ArchiverUnavailable`] if it cannot be found.
    pub fn locate(binary: &str) -> Result<Self> {
        let program = which::which(binary)
            .map_err(|e| PatchError::ArchiverUnavailable(format!("{binary}: {e}")))?;
        Ok(Self { program })
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// Entry names exactly as tar stored them.
    fn stored_names(&self, archive_path: &Path) -> Result<Vec<String>> {
        let mut cmd = self.command();
        cmd.args(["-t", "-j", "-f"]).arg(archive_path);
        let stdout = self.run(cmd, &format!("listing {}", archive_path.display()))?;

        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn run(&self, mut cmd: Command, what: &str) -> Result<Vec<u8>> {
        debug!(command = ?cmd, "Running archiver");
        let output = cmd
            .output()
            .map_err(|e| PatchError::ArchiverUnavailable(format!("{}: {e}", self.program.display())))?;

        if !output.status.success() {
            return Err(PatchError::ArchiveFailed(format!(
                "{what}: tar exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }
}

impl Archiver for TarCommand {
    fn extension(&self) -> &str {
        "tar.bz2"
    }

    fn create(&self, archive_path: &Path, base_dir: &Path, files: &[String]) -> Result<()> {
        let span = span!(Level::DEBUG, "archive", path = %archive_path.display());
        let _guard = span.enter();

        // tar reads the list line by line; a newline cannot be expressed in it.
        if let Some(bad) = files.iter().find(|f| f.contains('\n')) {
            return Err(PatchError::ArchiveFailed(format!(
                "creating {}: file name contains a newline: {bad:?}",
                archive_path.display()
            )));
        }

        // The file list goes over stdin so only staged content is packed.
        let mut child = Command::new(&self.program)
            .args(["-c", "-j", "-f"])
            .arg(archive_path)
            .args(["-T", "-"])
            .current_dir(base_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PatchError::ArchiverUnavailable(format!("{}: {e}", self.program.display())))?;

        let written = child.stdin.take().map_or(Ok(()), |mut stdin| {
            // Anchored with `./` so names starting with `-` are not read as options.
            let list: String = files.iter().map(|file| format!("./{file}\n")).collect();
            stdin.write_all(list.as_bytes())
        });

        let output = child
            .wait_with_output()
            .map_err(|e| PatchError::ArchiveFailed(e.to_string()))?;

        match (output.status.success(), written) {
            (true, Ok(())) => {}
            (success, written) => {
                let mut message = format!("creating {}: ", archive_path.display());
                if let Err(e) = written {
                    message.push_str(&format!("writing file list failed: {e}"));
                    if !success {
                        message.push_str("; ");
                    }
                }
                if !success {
                    message.push_str(&format!(
                        "tar exited with {}: {}",
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    ));
                }
                return Err(PatchError::ArchiveFailed(message));
            }
        }

        debug!(files = files.len(), "Archive created");
        Ok(())
    }

    fn list(&self, archive_path: &Path) -> Result<Vec<String>> {
        Ok(self
            .stored_names(archive_path)?
            .iter()
            .map(|name| normalize_entry_name(name))
            .collect())
    }

    fn extract_entry(&self, archive_path: &Path, entry: &str) -> Result<Vec<u8>> {
        let wanted = normalize_entry_name(entry);
        // tar matches members by their stored name, which may carry `./`.
        let stored = self
            .stored_names(archive_path)?
            .into_iter()
            .find(|name| normalize_entry_name(name) == wanted)
            .ok_or_else(|| {
                PatchError::ArchiveFailed(format!(
                    "{}: entry {wanted} not found",
                    archive_path.display()
                ))
            })?;

        let mut cmd = self.command();
        cmd.args(["-x", "-j", "-O", "-f"]).arg(archive_path).arg(&stored);
        self.run(
            cmd,
            &format!("extracting {entry} from {}", archive_path.display()),
        )
    }
}

/// In-process tar + zstd archiver.
#[derive(Debug, Clone)]
pub struct NativeTar {
    level: i32,
}

impl NativeTar {
    /// Archiver compressing at zstd `level`.
    #[must_use]
    pub const fn new(level: i32) -> Self {
        Self { level }
    }

    fn open(archive_path: &Path) -> Result<tar::Archive<zstd::Decoder<'static, BufReader<File>>>> {
        let file = File::open(archive_path).map_err(|e| failed(archive_path, &e))?;
        let decoder = zstd::Decoder::new(file).map_err(|e| failed(archive_path, &e))?;
        Ok(tar::Archive::new(decoder))
    }
}

fn failed(archive_path: &Path, err: &dyn std::fmt::Display) -> PatchError {
    PatchError::ArchiveFailed(format!("{}: {err}", archive_path.display()))
}

impl Archiver for NativeTar {
    fn extension(&self) -> &str {
        "tar.zst"
    }

    fn create(&self, archive_path: &Path, base_dir: &Path, files: &[String]) -> Result<()> {
        let span = span!(Level::DEBUG, "archive", path = %archive_path.display());
        let _guard = span.enter();

        let file = File::create(archive_path).map_err(|e| failed(archive_path, &e))?;
        let encoder = zstd::Encoder::new(BufWriter::new(file), self.level)
            .map_err(|e| failed(archive_path, &e))?;
        let mut builder = tar::Builder::new(encoder);

        for rel in files {
            let source = crate::tracking::scanner::resolve_relative(base_dir, rel);
            builder
                .append_path_with_name(&source, rel)
                .map_err(|e| failed(archive_path, &format!("{rel}: {e}")))?;
        }

        let encoder = builder.into_inner().map_err(|e| failed(archive_path, &e))?;
        let mut writer = encoder.finish().map_err(|e| failed(archive_path, &e))?;
        writer.flush().map_err(|e| failed(archive_path, &e))?;

        debug!(files = files.len(), "Archive created");
        Ok(())
    }

    fn list(&self, archive_path: &Path) -> Result<Vec<String>> {
        let mut archive = Self::open(archive_path)?;
        let mut names = Vec::new();
        for entry in archive.entries().map_err(|e| failed(archive_path, &e))? {
            let entry = entry.map_err(|e| failed(archive_path, &e))?;
            let path = entry.path().map_err(|e| failed(archive_path, &e))?;
            names.push(normalize_entry_name(&path.to_string_lossy()));
        }
        Ok(names)
    }

    fn extract_entry(&self, archive_path: &Path, wanted: &str) -> Result<Vec<u8>> {
        let wanted = normalize_entry_name(wanted);
        let mut archive = Self::open(archive_path)?;
        for entry in archive.entries().map_err(|e| failed(archive_path, &e))? {
            let mut entry = entry.map_err(|e| failed(archive_path, &e))?;
            let name = entry.path().map_err(|e| failed(archive_path, &e))?;
            if normalize_entry_name(&name.to_string_lossy()) == wanted {
                let mut content = Vec::new();
                entry
                    .read_to_end(&mut content)
                    .map_err(|e| failed(archive_path, &e))?;
                return Ok(content);
            }
        }
        Err(failed(archive_path, &format!("entry {wanted} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::TempDir;

    fn staged() -> Result<TempDir> {
        let temp = TempDir::new()?;
        fs::create_dir_all(temp.path().join("stage/dir"))?;
        fs::write(temp.path().join("stage/dir/a.txt"), "alpha")?;
        fs::write(temp.path().join("stage/b.txt"), "beta")?;
        fs::write(temp.path().join("stage/not-listed.txt"), "skip me")?;
        Ok(temp)
    }

    fn exercise(archiver: &dyn Archiver) -> Result<()> {
        let temp = staged()?;
        let archive = temp
            .path()
            .join(format!("out.{}", archiver.extension()));
        let files = vec!["dir/a.txt".to_string(), "b.txt".to_string()];

        archiver.create(&archive, &temp.path().join("stage"), &files)?;
        assert!(archive.exists());

        let mut listed = archiver.list(&archive)?;
        listed.sort();
        assert_eq!(listed, vec!["b.txt", "dir/a.txt"]);

        assert_eq!(archiver.extract_entry(&archive, "dir/a.txt")?, b"alpha");
        assert!(archiver.extract_entry(&archive, "missing.txt").is_err());
        Ok(())
    }

    #[test]
    fn test_native_round_trip() -> Result<()> {
        exercise(&NativeTar::new(3))
    }

    #[test]
    fn test_tar_command_round_trip() -> Result<()> {
        let Some(tar) = system_tar() else {
            return Ok(());
        };
        exercise(&tar)
    }

    fn system_tar() -> Option<TarCommand> {
        // Needs a system tar with bzip2 support.
        let tar = TarCommand::locate("tar").ok()?;
        which::which("bzip2").ok()?;
        Some(tar)
    }

    #[test]
    fn test_tar_command_handles_dash_names() -> Result<()> {
        let Some(tar) = system_tar() else {
            return Ok(());
        };
        let temp = staged()?;
        let stage = temp.path().join("stage");
        fs::write(stage.join("-C"), "dash")?;
        fs::write(stage.join("--foo.txt"), "double dash")?;

        let archive = temp.path().join("out.tar.bz2");
        let files = vec!["-C".to_string(), "--foo.txt".to_string(), "b.txt".to_string()];
        tar.create(&archive, &stage, &files)?;

        let mut listed = tar.list(&archive)?;
        listed.sort();
        assert_eq!(listed, vec!["--foo.txt", "-C", "b.txt"]);
        assert_eq!(tar.extract_entry(&archive, "-C")?, b"dash");
        assert_eq!(tar.extract_entry(&archive, "--foo.txt")?, b"double dash");
        Ok(())
    }

    #[test]
    fn test_tar_command_rejects_newline_names() -> Result<()> {
        let Some(tar) = system_tar() else {
            return Ok(());
        };
        let temp = staged()?;
        let archive = temp.path().join("out.tar.bz2");
        let err = tar
            .create(&archive, &temp.path().join("stage"), &["a\nb".to_string()])
            .unwrap_err();
        assert!(matches!(err, PatchError::ArchiveFailed(ref m) if m.contains("newline")));
        Ok(())
    }

    #[test]
    fn test_tar_command_reports_unread_file_list() -> Result<()> {
        // `true` exits without reading stdin, so a long list cannot be written.
        let Ok(exits_early) = TarCommand::locate("true") else {
            return Ok(());
        };
        let temp = staged()?;
        let files: Vec<String> = (0..200_000).map(|i| format!("file_{i}.txt")).collect();

        let err = exits_early
            .create(&temp.path().join("out.tar.bz2"), temp.path(), &files)
            .unwrap_err();
        assert!(
            matches!(err, PatchError::ArchiveFailed(ref m) if m.contains("writing file list failed"))
        );
        Ok(())
    }

    #[test]
    fn test_native_create_fails_on_missing_file() -> Result<()> {
        let temp = staged()?;
        let archive = temp.path().join("out.tar.zst");
        let err = NativeTar::new(3)
            .create(&archive, &temp.path().join("stage"), &["nope.txt".to_string()])
            .unwrap_err();
        assert!(matches!(err, PatchError::ArchiveFailed(_)));
        Ok(())
    }

    #[test]
    fn test_locate_unknown_binary() {
        assert!(matches!(
            TarCommand::locate("definitely-not-a-real-tar-binary"),
            Err(PatchError::ArchiverUnavailable(_))
        ));
    }

    #[test]
    fn test_normalize_entry_name() {
        assert_eq!(normalize_entry_name("./a/b"), "a/b");
        assert_eq!(normalize_entry_name("a/b\r"), "a/b");
    }
}
