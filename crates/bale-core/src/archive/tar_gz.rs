//! Gzip-compressed tar archives

use super::handle::ArchiveHandle;
use super::tar::{create_handle, has_extension, open_handle, Tar};
use super::{Archiver, Visitor};
use crate::config::{Config, TarOptions};
use crate::stream::{Gzip, StreamWrapper};
use crate::{Error, Result};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Tar archiver with gzip framing
#[derive(Debug, Clone, Default)]
pub struct TarGz {
    tar: Tar,
    gzip: Gzip,
}

impl TarGz {
    /// Create a tar.gz archiver; `level` must be within 0-9.
    pub fn new(options: TarOptions, level: u32) -> Result<Self> {
        Ok(Self::with_gzip(Tar::new(options), Gzip::new(level)?))
    }

    pub fn with_gzip(tar: Tar, gzip: Gzip) -> Self {
        Self { tar, gzip }
    }

    /// Build from a loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.tar.clone(), config.gzip.level)
    }

    pub fn tar(&self) -> &Tar {
        &self.tar
    }

    pub fn level(&self) -> u32 {
        self.gzip.level()
    }

    /// Start writing a gzip-compressed tar stream to `out`
    pub fn create<'a>(&self, out: impl Write + Send + 'a) -> Result<ArchiveHandle<'a>> {
        create_handle(&self.gzip, Box::new(out))
    }

    /// Start reading a gzip-compressed tar stream from `input`
    pub fn open<'a>(&self, input: impl Read + Send + 'a) -> Result<ArchiveHandle<'a>> {
        open_handle(&self.gzip, Box::new(input))
    }
}

impl Archiver for TarGz {
    fn archive(&self, sources: &[PathBuf], destination: &Path) -> Result<()> {
        if !has_extension(destination, &[".tar.gz", ".tgz"]) {
            return Err(Error::Precondition(format!(
                "{} must have a .tar.gz or .tgz extension",
                destination.display()
            )));
        }
        self.tar.archive_with(&self.gzip, sources, destination)
    }

    fn unarchive(&self, source: &Path, destination: &Path) -> Result<()> {
        self.tar.unarchive_with(&self.gzip, source, destination)
    }

    fn walk(&self, source: &Path, visitor: Visitor<'_>) -> Result<()> {
        self.tar.walk_with(&self.gzip, source, visitor)
    }

    fn extract(&self, source: &Path, target: &str, destination: &Path) -> Result<()> {
        self.tar
            .extract_with(&self.gzip, source, target, destination)
    }

    fn format_name(&self) -> &'static str {
        self.gzip.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;
    use crate::stream::GZIP_MAGIC;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_archive_is_gzip_framed() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("docs");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("readme.md"), "hello").unwrap();

        let archive = temp_dir.path().join("docs.tgz");
        TarGz::default().archive(&[source], &archive).unwrap();

        let bytes = fs::read(&archive).unwrap();
        assert_eq!(bytes[..2], GZIP_MAGIC);
    }

    #[test]
    fn test_rejects_plain_tar_name() {
        let temp_dir = TempDir::new().unwrap();
        let err = TarGz::default()
            .archive(&[temp_dir.path().to_path_buf()], &temp_dir.path().join("x.tar"))
            .unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }

    #[test]
    fn test_invalid_level() {
        assert!(matches!(
            TarGz::new(TarOptions::default(), 10),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_stream_handles_round_trip() {
        let tar_gz = TarGz::new(TarOptions::default(), 9).unwrap();
        let mut buf = Vec::new();
        {
            let mut handle = tar_gz.create(&mut buf).unwrap();
            handle
                .write(Entry::file("note.txt", 4, 0o644, 0, &b"note"[..]))
                .unwrap();
            handle.close().unwrap();
        }

        let mut handle = tar_gz.open(&buf[..]).unwrap();
        let mut entries = handle.entries().unwrap();
        let mut entry = entries.read_next().unwrap().unwrap();
        let mut text = String::new();
        entry.read_to_string(&mut text).unwrap();
        assert_eq!(text, "note");
        drop(entry);
        assert!(entries.read_next().unwrap().is_none());
    }
}
