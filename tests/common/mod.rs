#![allow(dead_code)]

use anyhow::Result;
use filetime::FileTime;
use pathmanifest::config::Config;
use pathmanifest::patch::ArchiveBackend;
use pathmanifest::tracking::{FilterRules, Manifest};
use pathmanifest::PatchContext;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Fixed mtime every fixture file starts with.
pub const BASE_MTIME: i64 = 1_600_000_000;

/// Tracked tree fixture laid out as:
///
/// ```text
/// tree/
///   index.html
///   app/main.py
///   app/lib/util.py
///   logs/today.log
///   static/css/site.css
/// ```
pub struct TestTree {
    pub temp_dir: TempDir,
    pub root: PathBuf,
}

impl TestTree {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().join("tree");
        fs::create_dir(&root)?;

        let tree = Self { temp_dir, root };
        tree.write("index.html", "<html></html>")?;
        tree.write("app/main.py", "print('hi')")?;
        tree.write("app/lib/util.py", "def f(): pass")?;
        tree.write("logs/today.log", "started")?;
        tree.write("static/css/site.css", "body {}")?;
        Ok(tree)
    }

    /// Write `content` to `rel` and pin its mtime to [`BASE_MTIME`].
    pub fn write(&self, rel: &str, content: &str) -> Result<PathBuf> {
        self.write_at(rel, content, BASE_MTIME)
    }

    /// Write `content` to `rel` with an explicit mtime.
    pub fn write_at(&self, rel: &str, content: &str, mtime: i64) -> Result<PathBuf> {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime, 0))?;
        Ok(path)
    }

    pub fn touch(&self, rel: &str, mtime: i64) -> Result<()> {
        filetime::set_file_mtime(self.root.join(rel), FileTime::from_unix_time(mtime, 0))?;
        Ok(())
    }

    pub fn remove(&self, rel: &str) -> Result<()> {
        fs::remove_file(self.root.join(rel))?;
        Ok(())
    }

    pub fn manifest(&self, rules: &FilterRules) -> Result<Manifest> {
        Ok(Manifest::new(&self.root, rules, false)?)
    }

    /// Scratch directory next to (not inside) the tree.
    pub fn scratch(&self, name: &str) -> Result<PathBuf> {
        let path = self.temp_dir.path().join(name);
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Context using the in-process archiver so tests need no system tar.
    pub fn context(&self) -> PatchContext {
        let mut config = Config::default();
        config.archive.backend = ArchiveBackend::Native;
        PatchContext::new_explicit(self.root.clone(), config)
    }

    /// Write a config file selecting the native archiver, for CLI tests.
    pub fn config_file(&self) -> Result<PathBuf> {
        let path = self.temp_dir.path().join("config");
        fs::write(&path, "[archive]\nbackend = \"native\"\n")?;
        Ok(path)
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}
