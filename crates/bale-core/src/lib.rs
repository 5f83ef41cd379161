//! bale - tar and tar.gz archive engine
//!
//! Packs file-system trees into tar streams (optionally gzip framed) and
//! unpacks, walks or selectively extracts them again, refusing entries that
//! would land outside the destination.
//!
//! ```no_run
//! use bale_core::{Archiver, Config, TarGz};
//! use std::path::{Path, PathBuf};
//!
//! # fn main() -> bale_core::Result<()> {
//! let archiver = TarGz::from_config(&Config::load_or_default())?;
//! archiver.archive(&[PathBuf::from("docs")], Path::new("docs.tar.gz"))?;
//! archiver.extract(Path::new("docs.tar.gz"), "docs/readme.md", Path::new("out"))?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod config;
pub mod entry;
pub mod error;
pub mod fsutil;
pub mod paths;
pub mod security;
pub mod stream;

pub use error::{Error, Result};

// Re-export commonly used types
pub use archive::{
    archiver_for_path, ArchiveHandle, Archiver, Entries, Tar, TarGz, Visitor,
};
pub use config::{Config, GzipOptions, TarOptions};
pub use entry::{Entry, EntryInfo, EntryKind};
pub use paths::{multiple_top_levels, within};
