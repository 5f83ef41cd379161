//! Directory traversal: file-system subtrees into archive entries

use super::handle::ArchiveHandle;
use super::tolerate;
use crate::config::TarOptions;
use crate::entry::Entry;
use crate::{fsutil, paths, Error, Result};
use std::collections::HashMap;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Name a source gets at the top of the archive (its own base name)
pub(crate) fn top_level_name(source: &Path) -> String {
    absolute(source)
        .ok()
        .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
        .unwrap_or_default()
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| Error::at(path, e))
}

/// Archive names of files with more than one link, keyed by device and
/// inode. Later occurrences of the same file are written as hard links.
#[derive(Debug, Default)]
pub(crate) struct HardLinks {
    first_names: HashMap<(u64, u64), String>,
}

impl HardLinks {
    fn key(metadata: &Metadata) -> Option<(u64, u64)> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            (metadata.nlink() > 1).then(|| (metadata.dev(), metadata.ino()))
        }
        #[cfg(not(unix))]
        {
            let _ = metadata;
            None
        }
    }

    /// Name the file was first archived under, if it was
    fn first_name(&self, metadata: &Metadata) -> Option<String> {
        Self::key(metadata).and_then(|key| self.first_names.get(&key).cloned())
    }

    fn remember(&mut self, metadata: &Metadata, name: &str) {
        if let Some(key) = Self::key(metadata) {
            self.first_names.entry(key).or_insert_with(|| name.to_string());
        }
    }
}

/// Write `source` and, for a directory, everything beneath it.
///
/// Directories come before their children and siblings are visited in file
/// name order. `skip` names a path that must never be archived (the
/// destination itself when it sits inside a source directory).
pub(crate) fn write_source(
    handle: &mut ArchiveHandle<'_>,
    source: &Path,
    wrapping: Option<&str>,
    skip: Option<&Path>,
    links: &mut HardLinks,
    options: &TarOptions,
) -> Result<()> {
    let root = absolute(source)?;
    fs::metadata(&root).map_err(|e| Error::at(source, e))?;

    let mut base = wrapping.unwrap_or_default().to_string();
    let top = top_level_name(&root);
    if !top.is_empty() {
        if !base.is_empty() {
            base.push('/');
        }
        base.push_str(&top);
    }

    for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tolerate(options, e.into(), "walking source tree")?;
                continue;
            }
        };
        if skip == Some(entry.path()) {
            debug!(path = ?entry.path(), "Skipping the archive being written");
            continue;
        }
        if let Err(e) = write_node(handle, &entry, &root, &base, links) {
            tolerate(options, e, "writing entry")?;
        }
    }
    Ok(())
}

fn write_node(
    handle: &mut ArchiveHandle<'_>,
    node: &DirEntry,
    root: &Path,
    base: &str,
    links: &mut HardLinks,
) -> Result<()> {
    let path = node.path();
    let relative = path.strip_prefix(root).map_err(|_| {
        Error::Precondition(format!("{:?} is not under {:?}", path, root))
    })?;
    let name = paths::archive_name(base, relative);
    if name.is_empty() {
        return Ok(());
    }

    let metadata = node.metadata()?;
    let mode = fsutil::mode_of(&metadata);
    let mtime = fsutil::mtime_of(&metadata);
    let file_type = node.file_type();

    let entry = if file_type.is_dir() {
        debug!("Adding directory: {:?}", name);
        Entry::directory(format!("{}/", name), mode, mtime)
    } else if file_type.is_symlink() {
        let target = fs::read_link(path).map_err(|e| Error::at(path, e))?;
        debug!("Adding symlink: {:?} -> {:?}", name, target);
        Entry::symlink(name, target.to_string_lossy(), mtime)
    } else if file_type.is_file() {
        if let Some(first) = links.first_name(&metadata) {
            debug!("Adding hard link: {:?} -> {:?}", name, first);
            Entry::hard_link(name, first, mtime)
        } else {
            debug!("Adding file: {:?} as {:?}", path, name);
            let file = fsutil::open_for_read(path)?;
            handle.write(Entry::file(name.clone(), metadata.len(), mode, mtime, file))?;
            links.remember(&metadata, &name);
            return Ok(());
        }
    } else if let Some(kind) = fsutil::special_kind(&file_type) {
        debug!("Adding {}: {:?}", kind, name);
        Entry::special(name, kind, mode, mtime)
    } else {
        warn!("Skipping special file: {:?}", path);
        return Ok(());
    };

    handle.write(entry)
}
