//! Archive operations module

pub mod handle;
mod pack;
pub mod tar;
pub mod tar_gz;
mod unpack;

use crate::config::{Config, TarOptions};
use crate::entry::{Entry, EntryInfo};
use crate::{Error, Result};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing::error;

pub use self::tar::Tar;
pub use self::tar_gz::TarGz;
pub use handle::{ArchiveHandle, Entries};

/// Callback handed each entry of a walk. Return `ControlFlow::Break` to stop
/// reading early.
pub type Visitor<'v> = &'v mut dyn FnMut(&mut Entry<'_>) -> Result<ControlFlow<()>>;

/// File-level archive operations shared by every supported format
pub trait Archiver: Send + Sync {
    /// Pack `sources` (files or directory trees) into a new archive at
    /// `destination`.
    fn archive(&self, sources: &[PathBuf], destination: &Path) -> Result<()>;

    /// Materialize every entry of `source` under `destination`.
    fn unarchive(&self, source: &Path, destination: &Path) -> Result<()>;

    /// Stream the entries of `source` to `visitor` without touching disk.
    fn walk(&self, source: &Path, visitor: Visitor<'_>) -> Result<()>;

    /// Materialize only `target` (and, for a directory, everything under
    /// it) into `destination`, keeping the target's own name.
    fn extract(&self, source: &Path, target: &str, destination: &Path) -> Result<()>;

    /// List entry metadata without extracting
    fn inspect(&self, source: &Path) -> Result<Vec<EntryInfo>> {
        let mut infos = Vec::new();
        self.walk(source, &mut |entry| {
            infos.push(entry.info().clone());
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(infos)
    }

    /// Get the format name for this archiver
    fn format_name(&self) -> &'static str;
}

/// Pick an archiver from the file name of `path`
pub fn archiver_for_path(path: &Path, config: &Config) -> Result<Box<dyn Archiver>> {
    if tar::has_extension(path, &[".tar.gz", ".tgz"]) {
        return Ok(Box::new(TarGz::from_config(config)?));
    }
    if tar::has_extension(path, &[".tar"]) {
        return Ok(Box::new(Tar::new(config.tar.clone())));
    }
    Err(Error::UnsupportedFormat(format!(
        "{}: expected .tar, .tar.gz or .tgz",
        path.display()
    )))
}

/// Apply the continue-on-error policy to a failure while handling one node.
///
/// Fatal errors always propagate. Other errors are logged and swallowed when
/// `continue_on_error` is set.
pub(crate) fn tolerate(options: &TarOptions, err: Error, context: &str) -> Result<()> {
    if err.is_fatal() || !options.continue_on_error {
        return Err(err);
    }
    error!(context = %context, "{}", err);
    Ok(())
}
