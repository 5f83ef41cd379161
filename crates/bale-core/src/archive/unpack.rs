//! Materializing archive entries on disk

use crate::config::TarOptions;
use crate::entry::{Entry, EntryKind};
use crate::{fsutil, paths, security, Error, Result};
use std::path::Path;
use tracing::debug;

/// Write one entry under `root`.
///
/// `strip` is an archive prefix removed from the entry name and from hard
/// link targets, so a subtree can be rebased. `root` must exist; every
/// created path is checked to stay inside it.
pub(crate) fn materialize(
    entry: &mut Entry<'_>,
    root: &Path,
    strip: &str,
    options: &TarOptions,
) -> Result<()> {
    let kind = entry.kind();
    match kind {
        EntryKind::GlobalHeader => return Ok(()),
        EntryKind::Unsupported(flag) => {
            return Err(Error::UnknownTypeFlag {
                name: entry.name().to_string(),
                flag: flag as char,
            })
        }
        _ => {}
    }

    let name = paths::clean(entry.name());
    let dest = security::sanitize_path(root, paths::relative_to(strip, &name))?;
    if !kind.is_dir() && !options.overwrite_existing && fsutil::file_exists(&dest) {
        return Err(Error::FileExists(dest));
    }

    debug!("Extracting {}: {:?}", kind, dest);
    match kind {
        EntryKind::Directory => {
            security::check_within(root, &dest)?;
            fsutil::mkdir_all(&dest)?;
        }
        EntryKind::RegularFile
        | EntryKind::CharDevice
        | EntryKind::BlockDevice
        | EntryKind::Fifo => {
            prepare_parent(root, &dest)?;
            let mode = entry.info().mode;
            let mtime = entry.info().mtime;
            fsutil::write_new_file(&dest, entry, mode)?;
            fsutil::set_mtime(&dest, mtime);
        }
        EntryKind::Symlink => {
            let target = link_target(entry)?;
            security::validate_symlink(root, &dest, &target)?;
            prepare_parent(root, &dest)?;
            fsutil::write_new_symlink(&dest, &target)?;
        }
        EntryKind::HardLink => {
            let target = link_target(entry)?;
            let target = paths::clean(&target);
            let existing = security::resolve_hard_link(root, paths::relative_to(strip, &target))?;
            prepare_parent(root, &dest)?;
            security::check_parent_within(root, &existing)?;
            fsutil::write_new_hard_link(&dest, &existing)?;
        }
        EntryKind::GlobalHeader | EntryKind::Unsupported(_) => {}
    }
    Ok(())
}

fn prepare_parent(root: &Path, dest: &Path) -> Result<()> {
    security::check_parent_within(root, dest)?;
    match dest.parent() {
        Some(parent) => fsutil::mkdir_all(parent),
        None => Ok(()),
    }
}

fn link_target(entry: &Entry<'_>) -> Result<String> {
    entry
        .info()
        .link_target
        .clone()
        .filter(|target| !target.is_empty())
        .ok_or_else(|| Error::Format(format!("{}: link without a target", entry.name())))
}
