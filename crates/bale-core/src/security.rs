//! Containment checks for materializing untrusted archive entries

use crate::{Error, Result};
use std::collections::VecDeque;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{error, warn};

pub use crate::paths::within;

/// Map an archive-relative name onto a path under `base`, refusing names
/// that are absolute or climb out through `..`.
pub fn sanitize_path(base: &Path, untrusted: &str) -> Result<PathBuf> {
    let mut result = base.to_path_buf();

    for component in Path::new(untrusted).components() {
        match component {
            Component::Normal(name) => result.push(name),
            Component::CurDir => {}
            Component::ParentDir => {
                error!(path = %untrusted, "Path contains parent directory component");
                return Err(Error::SecurityError(format!(
                    "Path traversal attempt detected: {:?}",
                    untrusted
                )));
            }
            Component::RootDir => {
                error!(path = %untrusted, "Path is absolute");
                return Err(Error::SecurityError(format!(
                    "Absolute path not allowed: {:?}",
                    untrusted
                )));
            }
            Component::Prefix(_) => {
                error!(path = %untrusted, "Path contains Windows prefix");
                return Err(Error::SecurityError(format!(
                    "Windows path prefix not allowed: {:?}",
                    untrusted
                )));
            }
        }
    }

    Ok(result)
}

/// Validate that a symlink created at `link_path` pointing at `target`
/// resolves inside `base`.
///
/// The target is resolved against the link's parent directory, exactly as
/// the operating system would when following it: links already on disk
/// along the way are followed, so a chain of individually harmless links
/// cannot point out of `base`.
pub fn validate_symlink(base: &Path, link_path: &Path, target: &str) -> Result<()> {
    let target_path = Path::new(target);
    if target_path.is_absolute() || target_path.has_root() {
        warn!(link = ?link_path, target = %target, "Symlink has absolute target");
        return Err(Error::SecurityError(format!(
            "Symlink points outside extraction directory: {:?} -> {:?}",
            link_path, target
        )));
    }

    let link_parent = link_path
        .parent()
        .ok_or_else(|| Error::SecurityError("Symlink has no parent directory".to_string()))?;
    let start = link_parent.strip_prefix(base).map_err(|_| {
        Error::SecurityError(format!(
            "Symlink is outside extraction directory: {:?}",
            link_path
        ))
    })?;

    let mut normalized: Vec<_> = start
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();

    for component in target_path.components() {
        match component {
            Component::ParentDir => {
                if normalized.pop().is_none() {
                    warn!(link = ?link_path, target = %target, "Symlink target escapes extraction directory");
                    return Err(Error::SecurityError(format!(
                        "Symlink target would escape extraction directory: {:?} -> {:?}",
                        link_path, target
                    )));
                }
            }
            Component::Normal(_) => normalized.push(component),
            Component::CurDir => {}
            _ => {
                warn!(link = ?link_path, target = %target, component = ?component, "Unexpected path component in symlink target");
                return Err(Error::SecurityError(format!(
                    "Invalid symlink target: {:?} -> {:?}",
                    link_path, target
                )));
            }
        }
    }

    let canonical_base = base.canonicalize().map_err(|e| Error::at(base, e))?;
    let components = start.components().chain(target_path.components());
    let resolved = resolve_following_links(&canonical_base, components)?;
    if !resolved.starts_with(&canonical_base) {
        warn!(link = ?link_path, target = %target, resolved = ?resolved, "Symlink resolves outside extraction directory");
        return Err(Error::SecurityError(format!(
            "Symlink would resolve outside extraction directory: {:?} -> {:?}",
            link_path, target
        )));
    }
    Ok(())
}

/// Most links followed while resolving one path, as in Linux `MAXSYMLINKS`
const MAX_LINK_HOPS: usize = 40;

/// Walk `components` from `start`, replacing every symlink met on disk by
/// its target. Parts that do not exist yet are taken literally.
fn resolve_following_links<'p>(
    start: &Path,
    components: impl Iterator<Item = Component<'p>>,
) -> Result<PathBuf> {
    let mut pending: VecDeque<PathBuf> = components
        .map(|c| PathBuf::from(c.as_os_str()))
        .collect();
    let mut resolved = start.to_path_buf();
    let mut hops = 0;

    while let Some(part) = pending.pop_front() {
        match part.components().next() {
            Some(Component::Normal(name)) => {
                let next = resolved.join(name);
                let is_link = fs::symlink_metadata(&next)
                    .map(|m| m.file_type().is_symlink())
                    .unwrap_or(false);
                if !is_link {
                    resolved = next;
                    continue;
                }
                hops += 1;
                if hops > MAX_LINK_HOPS {
                    return Err(Error::SecurityError(format!(
                        "Too many levels of symbolic links at {:?}",
                        next
                    )));
                }
                let target = fs::read_link(&next).map_err(|e| Error::at(&next, e))?;
                for component in target.components().rev() {
                    pending.push_front(PathBuf::from(component.as_os_str()));
                }
            }
            Some(Component::ParentDir) => {
                resolved.pop();
            }
            Some(root @ Component::RootDir) => resolved.push(root.as_os_str()),
            Some(Component::Prefix(prefix)) => resolved = PathBuf::from(prefix.as_os_str()),
            Some(Component::CurDir) | None => {}
        }
    }
    Ok(resolved)
}

/// Resolve a hard link target, which tar records relative to the archive
/// root, onto a path under `base`.
pub fn resolve_hard_link(base: &Path, target: &str) -> Result<PathBuf> {
    sanitize_path(base, target).map_err(|_| {
        warn!(target = %target, "Hard link target escapes extraction directory");
        Error::SecurityError(format!(
            "Hard link target would escape extraction directory: {:?}",
            target
        ))
    })
}

/// Verify that `path`, or its closest existing ancestor, resolves inside
/// `base` once symlinks are followed. Catches archives that first plant a
/// symlink to somewhere else and then write through it.
pub fn check_within(base: &Path, path: &Path) -> Result<()> {
    let canonical_base = base.canonicalize().map_err(|e| Error::at(base, e))?;

    let mut existing = path;
    while existing.symlink_metadata().is_err() {
        match existing.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => existing = parent,
            _ => return Ok(()),
        }
    }
    let resolved = existing.canonicalize().map_err(|e| Error::at(existing, e))?;

    if !resolved.starts_with(&canonical_base) {
        error!(base = ?base, path = ?path, resolved = ?resolved, "Path escapes base directory");
        return Err(Error::SecurityError(format!(
            "Path would escape extraction directory: {:?}",
            path
        )));
    }
    Ok(())
}

/// [`check_within`] applied to the directory that will hold `path`
pub fn check_parent_within(base: &Path, path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => check_within(base, parent),
        None => Ok(()),
    }
}
