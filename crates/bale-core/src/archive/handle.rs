//! Tar codec bound to one open stream

use crate::entry::{Entry, EntryInfo, EntryKind};
use crate::stream::{Sink, Source};
use crate::{Error, Result};
use std::io::{self, Read};
use std::path::{Component, Path};
use tracing::{debug, warn};

enum State<'a> {
    Idle,
    Writing(tar::Builder<Sink<'a>>),
    Reading(tar::Archive<Source<'a>>),
    /// A write broke off mid-entry; the stream cannot be finished
    Failed,
    Closed,
}

/// Stateful binding between the codec and one stream.
///
/// A handle is either idle, open for writing, open for reading, or closed;
/// it never reads and writes at the same time. Closing is idempotent, and a
/// closed handle cannot be reopened.
pub struct ArchiveHandle<'a> {
    state: State<'a>,
}

impl Default for ArchiveHandle<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ArchiveHandle<'a> {
    pub fn new() -> Self {
        Self { state: State::Idle }
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.state {
            State::Idle => Ok(()),
            State::Writing(_) => Err(Error::Precondition(
                "tar archive is already created for writing".to_string(),
            )),
            State::Reading(_) => Err(Error::Precondition(
                "tar archive is already open for reading".to_string(),
            )),
            State::Failed | State::Closed => Err(Error::Precondition(
                "tar archive handle is closed".to_string(),
            )),
        }
    }

    /// Bind a fresh encoder writing to `sink`.
    pub fn create(&mut self, sink: Sink<'a>) -> Result<()> {
        self.ensure_idle()?;
        self.state = State::Writing(tar::Builder::new(sink));
        Ok(())
    }

    /// Bind a fresh decoder reading from `source`.
    pub fn open(&mut self, source: Source<'a>) -> Result<()> {
        self.ensure_idle()?;
        self.state = State::Reading(tar::Archive::new(source));
        Ok(())
    }

    pub fn is_writing(&self) -> bool {
        matches!(self.state, State::Writing(_))
    }

    pub fn is_reading(&self) -> bool {
        matches!(self.state, State::Reading(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Append one entry. Only regular files carry payload; it is copied
    /// verbatim and must be exactly `size` bytes long.
    ///
    /// A failure once the header has been emitted leaves the stream
    /// mid-entry: the handle is poisoned and every later write is refused.
    pub fn write(&mut self, mut entry: Entry<'_>) -> Result<()> {
        let builder = match &mut self.state {
            State::Writing(builder) => builder,
            State::Failed => {
                return Err(Error::Precondition(
                    "tar archive was abandoned after a failed write".to_string(),
                ))
            }
            _ => {
                return Err(Error::Precondition(
                    "tar archive was not created for writing first".to_string(),
                ))
            }
        };

        let kind = entry.kind();
        let name = entry.name().to_string();
        if name.is_empty() {
            return Err(Error::Precondition("missing file name".to_string()));
        }
        if Path::new(&name)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(Error::Precondition(format!(
                "{}: entry names must be relative and stay inside the archive",
                name
            )));
        }

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(kind.to_tar());
        header.set_mode(entry.info().mode & 0o7777);
        header.set_mtime(entry.info().mtime);

        let written = match kind {
            EntryKind::RegularFile => {
                let size = entry.info().size;
                let content = entry.take_content().ok_or_else(|| {
                    Error::Precondition(format!("{}: no way to read file contents", name))
                })?;
                header.set_size(size);
                builder.append_data(&mut header, &name, ExactReader::new(content, size, &name))
            }
            EntryKind::Symlink | EntryKind::HardLink => {
                let target = entry.info().link_target.clone().ok_or_else(|| {
                    Error::Precondition(format!("{}: missing link target", name))
                })?;
                header.set_size(0);
                builder.append_link(&mut header, &name, &target)
            }
            EntryKind::GlobalHeader => {
                return Err(Error::Precondition(format!(
                    "{}: global metadata records cannot be written as entries",
                    name
                )))
            }
            _ => {
                header.set_size(0);
                builder.append_data(&mut header, &name, io::empty())
            }
        };

        if let Err(source) = written {
            warn!(name = %name, error = %source, "Abandoning tar archive after failed write");
            self.state = State::Failed;
            return Err(Error::Incomplete { name, source });
        }
        debug!(name = %name, kind = %kind, "Wrote entry");
        Ok(())
    }

    /// Stream the entries of a handle opened for reading. Can be called
    /// once per open.
    pub fn entries(&mut self) -> Result<Entries<'_, 'a>> {
        let archive = match &mut self.state {
            State::Reading(archive) => archive,
            _ => {
                return Err(Error::Precondition(
                    "tar archive is not open for reading".to_string(),
                ))
            }
        };
        let inner = archive
            .entries()
            .map_err(|e| Error::Precondition(format!("reading entries: {}", e)))?;
        Ok(Entries { inner })
    }

    /// Finish the archive: end-of-archive blocks, then the compression
    /// trailer. Safe to call any number of times. A poisoned handle is only
    /// released.
    pub fn close(&mut self) -> Result<()> {
        if let State::Writing(builder) = std::mem::replace(&mut self.state, State::Closed) {
            let sink = builder.into_inner()?;
            sink.finish()?;
            debug!("Finalized tar archive");
        }
        Ok(())
    }
}

impl Drop for ArchiveHandle<'_> {
    fn drop(&mut self) {
        if self.is_writing() {
            if let Err(e) = self.close() {
                warn!(error = %e, "Failed to finalize tar archive on drop");
            }
        }
    }
}

/// Sequential reader over the entries of an open archive
pub struct Entries<'h, 'a> {
    inner: tar::Entries<'h, Source<'a>>,
}

impl<'h, 'a> Entries<'h, 'a> {
    /// Next entry, or `None` at end of archive.
    ///
    /// Whatever payload of the previous entry was left unread is skipped.
    /// Global metadata records are consumed here and never returned.
    pub fn read_next(&mut self) -> Result<Option<Entry<'h>>> {
        loop {
            let raw = match self.inner.next() {
                None => return Ok(None),
                Some(Err(e)) => return Err(Error::from_decoder("reading next entry", e)),
                Some(Ok(raw)) => raw,
            };

            let kind = EntryKind::from_tar(raw.header().entry_type());
            if kind == EntryKind::GlobalHeader {
                skip_global_header(raw)?;
                continue;
            }

            let name = String::from_utf8_lossy(&raw.path_bytes()).into_owned();
            let header = raw.header();
            let mode = header
                .mode()
                .map_err(|e| Error::from_decoder(&format!("{}: reading mode", name), e))?;
            let mtime = header
                .mtime()
                .map_err(|e| Error::from_decoder(&format!("{}: reading mtime", name), e))?;
            let link_target = if kind.is_link() {
                raw.link_name_bytes()
                    .map(|target| String::from_utf8_lossy(&target).into_owned())
            } else {
                None
            };
            let size = if kind.has_payload() { raw.size() } else { 0 };

            let info = EntryInfo {
                name,
                kind,
                size,
                mode,
                mtime,
                link_target,
            };
            let content: Option<Box<dyn Read + 'h>> = if kind.has_payload() {
                Some(Box::new(raw))
            } else {
                None
            };
            return Ok(Some(Entry::new(info, content)));
        }
    }
}

impl<'h> Iterator for Entries<'h, '_> {
    type Item = Result<Entry<'h>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}

fn skip_global_header<R: Read>(mut raw: tar::Entry<'_, R>) -> Result<()> {
    let mut keys = Vec::new();
    let extensions = raw
        .pax_extensions()
        .map_err(|e| Error::from_decoder("parsing global metadata record", e))?;
    if let Some(extensions) = extensions {
        for extension in extensions {
            let extension =
                extension.map_err(|e| Error::from_decoder("parsing global metadata record", e))?;
            if let Ok(key) = extension.key() {
                keys.push(key.to_string());
            }
        }
    }
    debug!(keys = ?keys, "Skipping archive-global metadata record");
    Ok(())
}

/// Yields exactly `remaining` bytes of `inner`, failing if it runs dry first
struct ExactReader<'n, R> {
    inner: R,
    remaining: u64,
    name: &'n str,
}

impl<'n, R: Read> ExactReader<'n, R> {
    fn new(inner: R, size: u64, name: &'n str) -> Self {
        Self {
            inner,
            remaining: size,
            name,
        }
    }
}

impl<R: Read> Read for ExactReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "{}: content ended {} bytes short of declared size",
                    self.name, self.remaining
                ),
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}
