//! Archive member model shared by the traversal code and the tar codec

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read};

/// Kind of an archive member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    RegularFile,
    Directory,
    Symlink,
    HardLink,
    CharDevice,
    BlockDevice,
    Fifo,
    /// Archive-wide pax metadata (`g` records, as written by `git archive`)
    GlobalHeader,
    /// Any other type flag, kept verbatim
    Unsupported(u8),
}

impl EntryKind {
    /// Map a tar type flag onto an entry kind
    pub fn from_tar(entry_type: tar::EntryType) -> Self {
        match entry_type {
            tar::EntryType::Regular | tar::EntryType::Continuous => EntryKind::RegularFile,
            tar::EntryType::Directory => EntryKind::Directory,
            tar::EntryType::Symlink => EntryKind::Symlink,
            tar::EntryType::Link => EntryKind::HardLink,
            tar::EntryType::Char => EntryKind::CharDevice,
            tar::EntryType::Block => EntryKind::BlockDevice,
            tar::EntryType::Fifo => EntryKind::Fifo,
            tar::EntryType::XGlobalHeader => EntryKind::GlobalHeader,
            other => EntryKind::Unsupported(other.as_byte()),
        }
    }

    /// Tar type flag written for this kind
    pub fn to_tar(self) -> tar::EntryType {
        match self {
            EntryKind::RegularFile => tar::EntryType::Regular,
            EntryKind::Directory => tar::EntryType::Directory,
            EntryKind::Symlink => tar::EntryType::Symlink,
            EntryKind::HardLink => tar::EntryType::Link,
            EntryKind::CharDevice => tar::EntryType::Char,
            EntryKind::BlockDevice => tar::EntryType::Block,
            EntryKind::Fifo => tar::EntryType::Fifo,
            EntryKind::GlobalHeader => tar::EntryType::XGlobalHeader,
            EntryKind::Unsupported(flag) => tar::EntryType::new(flag),
        }
    }

    pub fn is_dir(self) -> bool {
        self == EntryKind::Directory
    }

    /// Symbolic or hard link
    pub fn is_link(self) -> bool {
        matches!(self, EntryKind::Symlink | EntryKind::HardLink)
    }

    /// Kinds whose header is followed by payload blocks
    pub fn has_payload(self) -> bool {
        self == EntryKind::RegularFile
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::RegularFile => f.write_str("file"),
            EntryKind::Directory => f.write_str("directory"),
            EntryKind::Symlink => f.write_str("symlink"),
            EntryKind::HardLink => f.write_str("hard link"),
            EntryKind::CharDevice => f.write_str("character device"),
            EntryKind::BlockDevice => f.write_str("block device"),
            EntryKind::Fifo => f.write_str("fifo"),
            EntryKind::GlobalHeader => f.write_str("global header"),
            EntryKind::Unsupported(flag) => write!(f, "type {:?}", *flag as char),
        }
    }
}

/// Metadata of an archive member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    /// Path within the archive, forward-slash separated
    pub name: String,
    /// Member kind
    pub kind: EntryKind,
    /// Payload length in bytes (0 unless `kind` is a regular file)
    pub size: u64,
    /// Permission bits
    pub mode: u32,
    /// Modification time (Unix timestamp)
    pub mtime: u64,
    /// Link target (for symlinks and hard links)
    pub link_target: Option<String>,
}

/// One archive member, with its payload while it is being written or read.
///
/// The payload can be consumed once. On the read side it is a window into
/// the decoder and becomes meaningless as soon as the next entry is
/// requested.
pub struct Entry<'a> {
    info: EntryInfo,
    content: Option<Box<dyn Read + 'a>>,
}

impl fmt::Debug for Entry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("info", &self.info)
            .field("has_content", &self.content.is_some())
            .finish()
    }
}

impl<'a> Entry<'a> {
    pub fn new(info: EntryInfo, content: Option<Box<dyn Read + 'a>>) -> Self {
        Self { info, content }
    }

    /// Regular file whose payload is read from `content`
    pub fn file(
        name: impl Into<String>,
        size: u64,
        mode: u32,
        mtime: u64,
        content: impl Read + 'a,
    ) -> Self {
        Self::new(
            EntryInfo {
                name: name.into(),
                kind: EntryKind::RegularFile,
                size,
                mode,
                mtime,
                link_target: None,
            },
            Some(Box::new(content)),
        )
    }

    pub fn directory(name: impl Into<String>, mode: u32, mtime: u64) -> Self {
        Self::header_only(name.into(), EntryKind::Directory, mode, mtime, None)
    }

    pub fn symlink(name: impl Into<String>, target: impl Into<String>, mtime: u64) -> Self {
        Self::header_only(
            name.into(),
            EntryKind::Symlink,
            0o777,
            mtime,
            Some(target.into()),
        )
    }

    pub fn hard_link(name: impl Into<String>, target: impl Into<String>, mtime: u64) -> Self {
        Self::header_only(
            name.into(),
            EntryKind::HardLink,
            0o644,
            mtime,
            Some(target.into()),
        )
    }

    /// Member with no payload (fifo, device node, ...)
    pub fn special(name: impl Into<String>, kind: EntryKind, mode: u32, mtime: u64) -> Self {
        Self::header_only(name.into(), kind, mode, mtime, None)
    }

    fn header_only(
        name: String,
        kind: EntryKind,
        mode: u32,
        mtime: u64,
        link_target: Option<String>,
    ) -> Self {
        Self::new(
            EntryInfo {
                name,
                kind,
                size: 0,
                mode,
                mtime,
                link_target,
            },
            None,
        )
    }

    pub fn info(&self) -> &EntryInfo {
        &self.info
    }

    pub fn into_info(self) -> EntryInfo {
        self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn kind(&self) -> EntryKind {
        self.info.kind
    }

    /// Whether the payload is still available
    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// Take the payload stream; later calls return `None`.
    pub fn take_content(&mut self) -> Option<Box<dyn Read + 'a>> {
        self.content.take()
    }

    /// Drain whatever is left of the payload, returning the bytes skipped.
    pub fn discard(&mut self) -> io::Result<u64> {
        match self.content.take() {
            Some(mut content) => io::copy(&mut content, &mut io::sink()),
            None => Ok(0),
        }
    }
}

impl Read for Entry<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.content.as_mut() {
            Some(content) => content.read(buf),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_is_read_at_most_once() {
        let mut entry = Entry::file("a.txt", 5, 0o644, 0, &b"hello"[..]);
        assert!(entry.has_content());

        let mut content = entry.take_content().unwrap();
        let mut buf = String::new();
        content.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hello");

        assert!(entry.take_content().is_none());
        assert_eq!(entry.discard().unwrap(), 0);
    }

    #[test]
    fn test_kind_maps_tar_flags() {
        assert_eq!(
            EntryKind::from_tar(tar::EntryType::new(b'\0')),
            EntryKind::RegularFile
        );
        assert_eq!(
            EntryKind::from_tar(tar::EntryType::new(b'g')),
            EntryKind::GlobalHeader
        );
        assert_eq!(
            EntryKind::from_tar(tar::EntryType::new(b'Z')),
            EntryKind::Unsupported(b'Z')
        );
        assert_eq!(EntryKind::HardLink.to_tar(), tar::EntryType::Link);
    }

    #[test]
    fn test_link_constructors_carry_target() {
        let link = Entry::symlink("l", "target.txt", 0);
        assert_eq!(link.info().link_target.as_deref(), Some("target.txt"));
        assert_eq!(link.info().size, 0);
        assert!(link.kind().is_link());
    }
}
