//! This library handles reading the header of **AXRP** compact archive files.
//!
//! # AXRP Archive Format Documentation
//!
//! An AXRP archive stores a project as a set of content parts located through a tree of named
//! groups. The tree is kept in a compressed header block at the start of the file. This crate
//! reads that header; locating and reading the content parts is left to the caller.
//!
//! ## File Structure
//!
//! An AXRP file consists of a prologue, followed by the compressed header block and the content
//! parts.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 2 bytes: 0xAC 0xEF                                         |
//! | 0x0002         | Reserved               | 2 bytes: Observed as 0x0A 0x00, never validated            |
//! | 0x0004         | Header Length          | 4 bytes: Size of the compressed header block               |
//! | 0x0008         | Header Block           | (Header Length) bytes: LZ4 chunks holding the header JSON  |
//!
//! ### Prologue
//!
//! - **Magic Number**: A 2-byte identifier set to `0xAC 0xEF`. Files that do not start with it are
//!   rejected before anything else is read.
//! - **Reserved**: Two bytes published as part of the signature (`0xAC 0xEF 0x0A 0x00`) but not
//!   compared, so files with other values are still accepted.
//! - **Header Length**: A 4-byte unsigned integer holding the size of the compressed header block.
//!   It is capped by [`read::LoadOptions::max_header_length`].
//!
//! ### Header Block
//!
//! The header block is a sequence of LZ4 stream chunks, each either a raw LZ4 block or stored
//! bytes (see [`compression`]). Once decompressed it holds a JSON document of the form
//!
//! ```json
//! {
//!   "root": {
//!     "children": { "pages": { "parts": { "home": 4096 } } },
//!     "parts": { "document": 1024 }
//!   }
//! }
//! ```
//!
//! where every group may carry `children` (nested groups) and `parts` (64-bit offsets or sizes of
//! content). Missing or `null` maps are read as empty.
//!
//! Files written before the format was finalized store the group directly, without the
//! enclosing `root` object. These are still accepted, see [`parse::parse_header`].
//!
//! ## Additional Information
//!
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Compression**: LZ4 stream chunks (varint chunk headers, raw LZ4 blocks)
//! - **Content Offset**: Content starts at `8 + Header Length`, see
//!   [`types::LoadedHeader::content_offset`]
//!

pub mod compression;
pub mod error;
pub mod parse;
pub mod read;
pub mod types;

pub use read::{load_header, load_header_with, LoadOptions};
pub use types::{ArchiveHeader, CompactGroup, LoadedHeader};
