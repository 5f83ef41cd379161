//! Stream wrapping layer
//!
//! Turns a raw byte sink or source into the stream the tar codec talks to:
//! unchanged for plain archives, gzip framed for compressed ones. The
//! wrapped sink must be [`Sink::finish`]ed exactly once so the compression
//! trailer lands before the raw stream is released by its owner.

use crate::{Error, Result};
use flate2::bufread::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, BufRead, BufReader, Read, Write};

/// First two bytes of every gzip member
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compression level used when none is configured
pub const DEFAULT_GZIP_LEVEL: u32 = 6;

/// Write side of a wrapped stream
pub enum Sink<'a> {
    /// Bytes go straight to the raw stream
    Plain(Box<dyn Write + Send + 'a>),
    /// Bytes are gzip compressed on their way to the raw stream
    Gzip(GzEncoder<Box<dyn Write + Send + 'a>>),
}

impl Write for Sink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Gzip(w) => w.flush(),
        }
    }
}

impl Sink<'_> {
    /// Write any compression trailer and flush the raw stream.
    pub fn finish(self) -> io::Result<()> {
        match self {
            Sink::Plain(mut w) => w.flush(),
            Sink::Gzip(encoder) => {
                let mut raw = encoder.finish()?;
                raw.flush()
            }
        }
    }
}

/// Read side of a wrapped stream
pub enum Source<'a> {
    /// Bytes come straight from the raw stream
    Plain(Box<dyn Read + Send + 'a>),
    /// Bytes are gunzipped from the raw stream
    Gzip(MultiGzDecoder<BufReader<Box<dyn Read + Send + 'a>>>),
}

impl Read for Source<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Source::Plain(r) => r.read(buf),
            Source::Gzip(r) => r.read(buf),
        }
    }
}

/// Strategy for wrapping raw streams before the tar codec sees them
pub trait StreamWrapper {
    /// Wrap a destination stream
    fn wrap_writer<'a>(&self, raw: Box<dyn Write + Send + 'a>) -> Result<Sink<'a>>;

    /// Wrap a source stream
    fn wrap_reader<'a>(&self, raw: Box<dyn Read + Send + 'a>) -> Result<Source<'a>>;

    /// Short name used in log output
    fn name(&self) -> &'static str;
}

/// Plain tar: no framing at all
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl StreamWrapper for Identity {
    fn wrap_writer<'a>(&self, raw: Box<dyn Write + Send + 'a>) -> Result<Sink<'a>> {
        Ok(Sink::Plain(raw))
    }

    fn wrap_reader<'a>(&self, raw: Box<dyn Read + Send + 'a>) -> Result<Source<'a>> {
        Ok(Source::Plain(raw))
    }

    fn name(&self) -> &'static str {
        "tar"
    }
}

/// Gzip framing (RFC 1952)
#[derive(Debug, Clone, Copy)]
pub struct Gzip {
    level: u32,
}

impl Default for Gzip {
    fn default() -> Self {
        Self {
            level: DEFAULT_GZIP_LEVEL,
        }
    }
}

impl Gzip {
    /// Create a gzip wrapper; `level` must be within 0-9.
    pub fn new(level: u32) -> Result<Self> {
        if level > 9 {
            return Err(Error::Config(format!(
                "gzip compression level must be 0-9, got {}",
                level
            )));
        }
        Ok(Self { level })
    }

    /// Configured compression level
    pub fn level(&self) -> u32 {
        self.level
    }
}

impl StreamWrapper for Gzip {
    fn wrap_writer<'a>(&self, raw: Box<dyn Write + Send + 'a>) -> Result<Sink<'a>> {
        Ok(Sink::Gzip(GzEncoder::new(raw, Compression::new(self.level))))
    }

    fn wrap_reader<'a>(&self, raw: Box<dyn Read + Send + 'a>) -> Result<Source<'a>> {
        let mut buffered = BufReader::new(raw);
        let head = buffered.fill_buf()?;
        if head.len() < GZIP_MAGIC.len() || head[..GZIP_MAGIC.len()] != GZIP_MAGIC {
            return Err(Error::Format(
                "initializing gzip decoder: missing gzip header".to_string(),
            ));
        }
        Ok(Source::Gzip(MultiGzDecoder::new(buffered)))
    }

    fn name(&self) -> &'static str {
        "tar.gz"
    }
}
