//! Command-line interface definitions for pathmanifest.
//!
//! This module contains all CLI argument parsing structures using clap's derive macros.
//! The CLI definitions are shared between the main binary and build tools (like xtask)
//! for man page generation.
//!
//! Note: Field-level documentation is provided via clap attributes (#[arg(help = "...")]),
//! so we allow missing_docs for this module to avoid redundant documentation.

#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Main CLI structure for pathmanifest.
#[derive(Parser)]
#[command(
    name = "pm",
    version = crate::VERSION,
    about = "Snapshot a directory tree and build incremental patches against it",
    long_about = "Records the files of a directory tree with their modification times, \
                  reports what changed since, and packs the changed files into a patch \
                  archive carrying size, mtime and MD5 metadata"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Root of the tracked tree
    #[arg(short, long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Configuration file to use
    #[arg(long, global = true, env = "PM_CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress informational messages
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Debug diagnostics; keeps the staging directory of a patch build
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Filter rules added on top of the configured ones.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Directory prefix to skip (repeatable)
    #[arg(long = "exclude", value_name = "PATH")]
    pub exclude: Vec<String>,

    /// Directory or file to track exclusively (repeatable)
    #[arg(long = "include", value_name = "PATH")]
    pub include: Vec<String>,

    /// File path prefix to skip (repeatable)
    #[arg(long = "exclude-file", value_name = "PATH")]
    pub exclude_file: Vec<String>,
}

/// All available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Record the current state of the tree
    WriteManifest {
        #[command(flatten)]
        filter: FilterArgs,

        /// Overwrite an existing manifest
        #[arg(short, long)]
        force: bool,
    },

    /// Show files created, updated or removed since the manifest was written
    Check {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Pack changed files into a patch archive
    MakePatch {
        /// Patch name (letters, digits and '_')
        name: String,

        #[command(flatten)]
        filter: FilterArgs,

        /// Directory the archive is written to
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Refuse patches with more files than this (0 disables the limit)
        #[arg(long, value_name = "N")]
        max_files: Option<usize>,
    },

    /// List patches recorded in the root and the files they touched
    ShowApplied {
        /// Only print the affected files
        #[arg(long)]
        files_only: bool,
    },

    /// Print the metadata of a patch archive without unpacking it
    ReadPatch {
        /// Patch archive
        archive: PathBuf,

        /// Print the raw metadata document
        #[arg(long)]
        json: bool,
    },

    /// Compare the files of a patch with their current content in the root
    Verify {
        /// Patch archive or metadata document
        patch: PathBuf,
    },

    /// Record a patch archive as applied to the root
    MarkApplied {
        /// Patch archive
        archive: PathBuf,
    },

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_make_patch() {
        let cli = Cli::parse_from([
            "pm",
            "--root",
            "/srv/site",
            "make-patch",
            "release_1",
            "--exclude",
            "logs",
            "--exclude",
            "cache",
            "--max-files",
            "10",
        ]);
        assert_eq!(cli.root, PathBuf::from("/srv/site"));
        match cli.command {
            Commands::MakePatch {
                name,
                filter,
                output,
                max_files,
            } => {
                assert_eq!(name, "release_1");
                assert_eq!(filter.exclude, vec!["logs", "cache"]);
                assert_eq!(output, PathBuf::from("."));
                assert_eq!(max_files, Some(10));
            }
            _ => panic!("expected make-patch"),
        }
    }
}
