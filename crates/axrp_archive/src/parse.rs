//! Decoding of the decompressed header payload.

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    error::Result,
    types::{ArchiveHeader, CompactGroup, HeaderShape},
};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Outcome of decoding a header payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedHeader {
    /// The payload was an object holding the tree under `root`
    Wrapped(CompactGroup),

    /// The payload had no `root`, and was read again as a bare group
    Bare(CompactGroup),
}

impl ParsedHeader {
    /// The encoding the payload used
    pub fn shape(&self) -> HeaderShape {
        match self {
            ParsedHeader::Wrapped(_) => HeaderShape::Wrapped,
            ParsedHeader::Bare(_) => HeaderShape::Bare,
        }
    }

    /// Normalize into a header, whichever encoding was used
    pub fn into_header(self) -> ArchiveHeader {
        match self {
            ParsedHeader::Wrapped(root) | ParsedHeader::Bare(root) => ArchiveHeader { root },
        }
    }
}

#[derive(Deserialize)]
struct WrappedHeader {
    #[serde(default)]
    root: Option<CompactGroup>,
}

/// Decode a decompressed header payload.
///
/// The payload is first read as `{"root": ...}`. When that succeeds but `root` is missing or
/// `null`, the same bytes are read again from the start as a bare [`CompactGroup`].
/// A leading UTF-8 byte order mark is skipped.
#[instrument(skip_all, fields(len = payload.len()), err)]
pub fn parse_header(payload: &[u8]) -> Result<ParsedHeader> {
    let payload = payload.strip_prefix(UTF8_BOM).unwrap_or(payload);

    let wrapped: WrappedHeader = serde_json::from_slice(payload)?;
    if let Some(root) = wrapped.root {
        return Ok(ParsedHeader::Wrapped(root));
    }

    debug!("header has no root, reading it as a bare group");
    let root: CompactGroup = serde_json::from_slice(payload)?;
    Ok(ParsedHeader::Bare(root))
}
