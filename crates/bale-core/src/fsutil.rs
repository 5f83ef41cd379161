//! File-system primitives used when packing and materializing entries

use crate::entry::EntryKind;
use crate::{Error, Result};
use std::fs::{self, File, Metadata, OpenOptions};
use std::io::{self, Read};
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::debug;

/// Whether anything (including a dangling symlink) exists at `path`
pub fn file_exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Create `path` and any missing ancestors; existing directories are fine.
pub fn mkdir_all(path: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(path).map_err(|e| Error::at(path, e))
}

fn mkdir_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => mkdir_all(parent),
        _ => Ok(()),
    }
}

/// Remove a non-directory at `path` so a new node can take its place
fn remove_existing(path: &Path) -> Result<()> {
    match path.symlink_metadata() {
        Ok(meta) if !meta.is_dir() => fs::remove_file(path).map_err(|e| Error::at(path, e)),
        _ => Ok(()),
    }
}

/// Open a file for reading
pub fn open_for_read(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| Error::at(path, e))
}

/// Create (or truncate) a file for writing with the given permission bits
pub fn create_for_write(path: &Path, mode: u32) -> Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode & 0o777);
    }
    #[cfg(not(unix))]
    let _ = mode;
    options.open(path).map_err(|e| Error::at(path, e))
}

/// Write `content` to a new file at `path`, replacing any non-directory
/// already there. Permission bits are applied exactly, bypassing the umask.
pub fn write_new_file(path: &Path, content: &mut dyn Read, mode: u32) -> Result<u64> {
    mkdir_parent(path)?;
    remove_existing(path)?;

    let mut file = create_for_write(path, mode)?;
    let written = io::copy(content, &mut file).map_err(|e| Error::at(path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777))
            .map_err(|e| Error::at(path, e))?;
    }

    Ok(written)
}

/// Create a symlink at `path` pointing at `target` verbatim
pub fn write_new_symlink(path: &Path, target: &str) -> Result<()> {
    mkdir_parent(path)?;
    remove_existing(path)?;
    symlink(target, path).map_err(|e| Error::at(path, e))
}

#[cfg(unix)]
fn symlink(target: &str, path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, path)
}

#[cfg(windows)]
fn symlink(target: &str, path: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, path)
}

#[cfg(not(any(unix, windows)))]
fn symlink(_target: &str, _path: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}

/// Create a hard link at `path` to the already extracted `existing`
pub fn write_new_hard_link(path: &Path, existing: &Path) -> Result<()> {
    mkdir_parent(path)?;
    remove_existing(path)?;
    fs::hard_link(existing, path).map_err(|e| Error::at(path, e))
}

/// Best-effort modification time restore
pub fn set_mtime(path: &Path, mtime: u64) {
    let mtime = filetime::FileTime::from_unix_time(mtime as i64, 0);
    if let Err(e) = filetime::set_file_mtime(path, mtime) {
        debug!("Failed to set mtime on {:?}: {}", path, e);
    }
}

/// Permission bits of a stat result
#[cfg(unix)]
pub fn mode_of(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

/// Permission bits of a stat result
#[cfg(not(unix))]
pub fn mode_of(metadata: &Metadata) -> u32 {
    match (metadata.is_dir(), metadata.permissions().readonly()) {
        (true, _) => 0o755,
        (false, true) => 0o444,
        (false, false) => 0o644,
    }
}

/// Modification time of a stat result as a Unix timestamp
pub fn mtime_of(metadata: &Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

/// Entry kind for nodes that are neither files, directories nor symlinks
pub fn special_kind(file_type: &fs::FileType) -> Option<EntryKind> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if file_type.is_fifo() {
            return Some(EntryKind::Fifo);
        }
        if file_type.is_char_device() {
            return Some(EntryKind::CharDevice);
        }
        if file_type.is_block_device() {
            return Some(EntryKind::BlockDevice);
        }
    }
    #[cfg(not(unix))]
    let _ = file_type;
    None
}
