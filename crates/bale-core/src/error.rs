//! Error types for bale-core

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Core error types for the bale library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// I/O operation on a specific file-system path failed
    #[error("{path}: {source}")]
    PathIo {
        /// Path the operation was applied to
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: io::Error,
    },

    /// Operation cannot start, or a handle was used in the wrong mode
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Destination already exists and overwriting is disabled
    #[error("File exists: {0}")]
    FileExists(PathBuf),

    /// Unsupported archive format, judged by file name
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Malformed or truncated archive stream
    #[error("Format error: {0}")]
    Format(String),

    /// A write failed after the entry header went out; the stream is unusable
    #[error("{name}: archive left incomplete: {source}")]
    Incomplete {
        /// Entry being written
        name: String,
        /// Underlying failure
        #[source]
        source: io::Error,
    },

    /// Entry carries a type flag the engine does not materialize
    #[error("{name}: unknown type flag: {flag}")]
    UnknownTypeFlag {
        /// Declared entry name
        name: String,
        /// Raw flag as found in the header
        flag: char,
    },

    /// Security violation detected
    #[error("Security error: {0}")]
    SecurityError(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration-related error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Attach the path an I/O failure happened on
    pub fn at(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::PathIo {
            path: path.into(),
            source,
        }
    }

    /// Classify a failure coming out of the tar decoder.
    ///
    /// Corrupt headers, checksum mismatches and truncation surface from the
    /// decoder as `io::Error`s; those mean the stream cannot be trusted past
    /// this point. Anything else is a genuine I/O failure of the source.
    pub fn from_decoder(context: &str, err: io::Error) -> Self {
        let corrupt = match err.kind() {
            io::ErrorKind::InvalidData
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::UnexpectedEof => true,
            // The tar crate reports bad checksums, unparsable numeric fields
            // and short blocks as `Other` with no OS error code.
            io::ErrorKind::Other => err.raw_os_error().is_none(),
            _ => false,
        };
        if corrupt {
            Error::Format(format!("{}: {}", context, err))
        } else {
            Error::Io(err)
        }
    }

    /// Whether this error must abort the operation regardless of the
    /// continue-on-error policy.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Precondition(_)
                | Error::UnsupportedFormat(_)
                | Error::Format(_)
                | Error::Incomplete { .. }
                | Error::UnknownTypeFlag { .. }
                | Error::Config(_)
        )
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        match err.path().map(|p| p.to_path_buf()) {
            Some(path) => Error::PathIo {
                path,
                source: err.into(),
            },
            None => Error::Io(err.into()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
