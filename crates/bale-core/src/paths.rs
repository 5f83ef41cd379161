//! Archive path mapping and the top-level folder heuristic
//!
//! Archive member names are always forward-slash separated and relative.
//! Everything here is purely lexical; nothing touches the file system.

use std::path::{Component, Path};

/// Lexically normalize a slash-separated path: collapse repeated and
/// trailing separators, drop `.` elements and fold `..` into its parent.
/// An empty result is reported as `"."`.
pub fn clean(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Parent of a cleaned archive path; empty for top-level names.
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Whether `candidate` is `target` itself or lexically nested under it.
pub fn within(target: &str, candidate: &str) -> bool {
    let target = clean(target);
    let candidate = clean(candidate);
    if candidate == target {
        return true;
    }
    candidate
        .strip_prefix(target.as_str())
        .is_some_and(|rest| rest.starts_with('/'))
}

/// `name` with the leading `base/` removed. `name` must be within `base`.
pub fn relative_to<'n>(base: &str, name: &'n str) -> &'n str {
    if base.is_empty() {
        return name;
    }
    name.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(name)
}

/// First element of a path, treating backslashes as separators and
/// ignoring a leading `/` or `./`.
fn top_level(path: &str) -> String {
    let cleaned = clean(&path.replace('\\', "/"));
    let cleaned = cleaned.trim_start_matches('/');
    cleaned.split('/').next().unwrap_or_default().to_string()
}

/// True when the paths do not all share the same first element.
///
/// Fewer than two paths never need a wrapping folder.
pub fn multiple_top_levels<S: AsRef<str>>(paths: &[S]) -> bool {
    if paths.len() < 2 {
        return false;
    }
    let mut first: Option<String> = None;
    for path in paths {
        let top = top_level(path.as_ref());
        match &first {
            None => first = Some(top),
            Some(seen) if *seen != top => return true,
            Some(_) => {}
        }
    }
    false
}

/// Folder name derived from an archive file name: the base name up to its
/// first dot, so `backup.tar.gz` gives `backup`.
pub fn folder_name_from_file_name(path: &Path) -> String {
    let base = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match base.find('.') {
        Some(0) | None => base,
        Some(idx) => base[..idx].to_string(),
    }
}

/// Archive name for a file-system path relative to a traversal root,
/// placed under `base` (which may be empty).
pub fn archive_name(base: &str, relative: &Path) -> String {
    let mut name = base.trim_end_matches('/').to_string();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            if !name.is_empty() {
                name.push('/');
            }
            name.push_str(&part.to_string_lossy());
        }
    }
    name
}
