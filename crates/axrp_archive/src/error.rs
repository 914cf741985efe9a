//! Error types that can be emitted from this library

use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// not a valid archive file
    #[error("not a valid archive file")]
    InvalidFormat(#[from] FormatError),

    /// more data requested than is available
    #[error("more data requested than is available: expected {expected} bytes, received {received}")]
    TruncatedInput {
        /// Number of bytes the caller asked for
        expected: u64,
        /// Number of bytes the stream produced before it ended
        received: u64,
    },

    /// unable to decompress the header block
    #[error("unable to decompress the header block")]
    DecompressionError(#[from] DecompressionError),

    /// malformed header at line {line}, column {column}
    #[error("malformed header at line {line}, column {column}")]
    MalformedHeader {
        /// One-based line of the payload where parsing failed
        line: usize,
        /// One-based column within that line
        column: usize,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// the header load was cancelled
    #[error("the header load was cancelled")]
    Cancelled(#[from] CancelReason),
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Error::MalformedHeader {
            line: source.line(),
            column: source.column(),
            source,
        }
    }
}

/// Error type to provide further information when the archive prologue is rejected
#[derive(Error, Diagnostic, Debug)]
pub enum FormatError {
    /// expected magic AC EF, found {0:02X?}
    #[error("expected magic AC EF, found {0:02X?}")]
    BadMagic([u8; 2]),

    /// header block of {length} bytes exceeds the limit of {limit} bytes
    #[error("header block of {length} bytes exceeds the limit of {limit} bytes")]
    HeaderTooLarge {
        /// Header length declared by the prologue
        length: u32,
        /// Configured maximum header length
        limit: u32,
    },
}

/// Error type to provide further information when the header block fails to decompress
#[derive(Error, Diagnostic, Debug)]
pub enum DecompressionError {
    /// corrupt lz4 chunk
    #[error("corrupt lz4 chunk: {0}")]
    Corrupt(#[source] std::io::Error),

    /// decompressed header exceeds the limit of {limit} bytes
    #[error("decompressed header exceeds the limit of {limit} bytes")]
    TooLarge { limit: u64 },
}

/// Why a header load stopped before completing
#[derive(Error, Diagnostic, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// cancellation was requested
    #[error("cancellation was requested")]
    Requested,

    /// no data arrived within {0:?}
    #[error("no data arrived within {0:?}")]
    TimedOut(Duration),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
