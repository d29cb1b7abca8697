//! Patch building and inspection.
//!
//! # Architecture
//!
//! - [`crate::patch::PatchBuilder`] - Stages changed files and archives them with metadata
//! - [`crate::patch::Archiver`] - Narrow archive capability with two backends
//! - [`crate::patch::PatchInfo`] - The metadata document carried by every patch
//! - [`crate::patch::reader`] - Metadata extraction, applied-patch history and drift checks
//!
//! # Usage
//!
//! ```no_run
//! use pathmanifest::patch::{BuildOptions, NativeTar, PatchBuilder, extract_patch_info};
//! use pathmanifest::tracking::{FilterRules, Manifest};
//! use std::path::Path;
//!
//! # fn main() -> pathmanifest::Result<()> {
//! let manifest = Manifest::new(Path::new("/srv/site"), &FilterRules::new(), false)?;
//! let archiver = NativeTar::new(3);
//!
//! let built = PatchBuilder::new(&manifest, &archiver, BuildOptions::default())
//!     .build("release_2", Path::new("/tmp/patches"))?
//!     .into_result()?;
//!
//! let info = extract_patch_info(&archiver, &built.archive_path)?;
//! assert_eq!(info.patch_name, "release_2");
//! # Ok(())
//! # }
//! ```

pub mod archiver;
pub mod builder;
pub mod info;
pub mod reader;

pub use archiver::{ArchiveBackend, Archiver, NativeTar, TarCommand, build_archiver};
pub use builder::{BuildOptions, BuildOutcome, BuiltPatch, PatchBuilder};
pub use info::{PatchFileRecord, PatchInfo, validate_patch_name};
pub use reader::{
    AppliedPatches, HashCheck, HashReport, extract_patch_info, list_applied_patches,
    record_applied, verify_hashes,
};
