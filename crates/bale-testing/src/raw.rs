//! Hand-built tar streams
//!
//! Names and link targets are copied into the header verbatim, so archives
//! can carry `..` components, absolute paths or unknown type flags that a
//! well-behaved writer would refuse to produce.

use anyhow::{ensure, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use tar::{Builder, EntryType, Header};

const BLOCK_SIZE: usize = 512;

/// Builder for raw tar byte streams
pub struct RawArchive {
    builder: Builder<Vec<u8>>,
}

impl Default for RawArchive {
    fn default() -> Self {
        Self::new()
    }
}

impl RawArchive {
    pub fn new() -> Self {
        Self {
            builder: Builder::new(Vec::new()),
        }
    }

    /// Regular file with mode 0644
    pub fn file(self, name: &str, content: &[u8]) -> Result<Self> {
        self.entry(name, b'0', 0o644, None, content)
    }

    /// Regular file with explicit permission bits
    pub fn file_with_mode(self, name: &str, mode: u32, content: &[u8]) -> Result<Self> {
        self.entry(name, b'0', mode, None, content)
    }

    pub fn dir(self, name: &str) -> Result<Self> {
        self.entry(name, b'5', 0o755, None, &[])
    }

    pub fn symlink(self, name: &str, target: &str) -> Result<Self> {
        self.entry(name, b'2', 0o777, Some(target), &[])
    }

    pub fn hard_link(self, name: &str, target: &str) -> Result<Self> {
        self.entry(name, b'1', 0o644, Some(target), &[])
    }

    /// Entry with an arbitrary type flag
    pub fn typed(self, name: &str, flag: u8, content: &[u8]) -> Result<Self> {
        self.entry(name, flag, 0o644, None, content)
    }

    /// Pax global header (`g`) carrying `records`
    pub fn global_header(self, records: &[(&str, &str)]) -> Result<Self> {
        let mut body = Vec::new();
        for (key, value) in records {
            body.extend_from_slice(&pax_record(key, value));
        }
        self.entry("pax_global_header", b'g', 0o644, None, &body)
    }

    /// Append one 512-byte block of non-zero bytes that is not a valid
    /// header
    pub fn garbage(mut self) -> Self {
        self.builder
            .get_mut()
            .extend_from_slice(&[0xA5; BLOCK_SIZE]);
        self
    }

    /// Finish with the end-of-archive blocks
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        Ok(self.builder.into_inner()?)
    }

    /// Finish and gzip the result
    pub fn into_gzip_bytes(self) -> Result<Vec<u8>> {
        gzip(&self.into_bytes()?)
    }

    fn entry(
        mut self,
        name: &str,
        flag: u8,
        mode: u32,
        link_target: Option<&str>,
        content: &[u8],
    ) -> Result<Self> {
        let mut header = Header::new_gnu();
        {
            let old = header.as_old_mut();
            copy_field(&mut old.name, name)?;
            if let Some(target) = link_target {
                copy_field(&mut old.linkname, target)?;
            }
        }
        header.set_entry_type(EntryType::new(flag));
        header.set_mode(mode);
        header.set_mtime(0);
        header.set_size(content.len() as u64);
        header.set_cksum();
        self.builder.append(&header, content)?;
        Ok(self)
    }
}

/// Gzip-compress `bytes` in one member
pub fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

fn copy_field(field: &mut [u8; 100], value: &str) -> Result<()> {
    ensure!(
        value.len() < field.len(),
        "{:?} does not fit a raw header field",
        value
    );
    field.fill(0);
    field[..value.len()].copy_from_slice(value.as_bytes());
    Ok(())
}

/// One pax extended header record: `<len> <key>=<value>\n`, where `len`
/// counts its own digits too
fn pax_record(key: &str, value: &str) -> Vec<u8> {
    let rest = format!(" {}={}\n", key, value);
    let mut len = rest.len() + 1;
    while format!("{}{}", len, rest).len() != len {
        len += 1;
    }
    format!("{}{}", len, rest).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_pax_record_length_counts_itself() {
        assert_eq!(pax_record("comment", "hi"), b"14 comment=hi\n");
        let record = pax_record("k", &"v".repeat(95));
        assert_eq!(record.len(), 102);
        assert!(record.starts_with(b"102 "));
    }

    #[test]
    fn test_hostile_names_survive_verbatim() {
        let bytes = RawArchive::new()
            .file("../evil.txt", b"boom")
            .unwrap()
            .into_bytes()
            .unwrap();
        let mut archive = tar::Archive::new(&bytes[..]);
        let mut entries = archive.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();
        assert_eq!(&*entry.path_bytes(), b"../evil.txt");
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "boom");
    }
}
