//! Header block decompression handling.
//!
//! The header block is a sequence of LZ4 stream chunks. Each chunk starts with varint fields
//!
//! | Field             | Description                                                        |
//! |-------------------|--------------------------------------------------------------------|
//! | Flags             | bit 0: compressed, bit 1: high compression, bits 2..: passes (0)   |
//! | Original Length   | Size of the chunk once decompressed                                |
//! | Compressed Length | Only present when compressed: size of the raw LZ4 block that follows |
//!
//! followed by the chunk data: a raw LZ4 block when compressed, the bytes as-is otherwise.
//! Varints are little endian groups of 7 bits, the high bit marking a continuation.

use std::io::{self, Read};

use tracing::{instrument, trace};

use crate::error::{DecompressionError, Result};

/// Chunk flag set when the chunk data is an LZ4 block
pub const CHUNK_COMPRESSED: u64 = 0x01;

/// Chunk flag set by writers using high compression, ignored when reading
pub const CHUNK_HIGH_COMPRESSION: u64 = 0x02;

fn corrupt(message: impl Into<String>) -> DecompressionError {
    DecompressionError::Corrupt(io::Error::new(io::ErrorKind::InvalidData, message.into()))
}

/// Read a varint, returning `None` when `input` is already exhausted
fn read_varint(input: &mut &[u8]) -> std::result::Result<Option<u64>, DecompressionError> {
    if input.is_empty() {
        return Ok(None);
    }

    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let (&byte, rest) = input
            .split_first()
            .ok_or_else(|| corrupt("varint runs past the end of the block"))?;
        *input = rest;

        value |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok(Some(value));
        }

        shift += 7;
        if shift > 63 {
            return Err(corrupt("varint is too long"));
        }
    }
}

/// Streaming decoder over a fully buffered header block
///
/// Chunks are decoded one at a time. Output is capped at `limit` bytes, checked against the
/// declared chunk sizes before anything is allocated.
pub struct HeaderBlockReader<'a> {
    remaining: &'a [u8],
    limit: u64,
    produced: u64,
    chunk: Vec<u8>,
    offset: usize,
}

impl<'a> HeaderBlockReader<'a> {
    #[instrument(skip(block), fields(len = block.len()))]
    pub fn new(block: &'a [u8], limit: u64) -> Self {
        Self {
            remaining: block,
            limit,
            produced: 0,
            chunk: Vec::new(),
            offset: 0,
        }
    }

    /// Decode the next non-empty chunk into `self.chunk`, returning `false` at the end of the block
    fn next_chunk(&mut self) -> std::result::Result<bool, DecompressionError> {
        loop {
            let Some(flags) = read_varint(&mut self.remaining)? else {
                return Ok(false);
            };

            let passes = flags >> 2;
            if passes != 0 {
                return Err(corrupt(format!("chunk with {passes} passes is not supported")));
            }

            let original = read_varint(&mut self.remaining)?
                .ok_or_else(|| corrupt("chunk ends before its original length"))?;
            let compressed = if flags & CHUNK_COMPRESSED != 0 {
                read_varint(&mut self.remaining)?
                    .ok_or_else(|| corrupt("chunk ends before its compressed length"))?
            } else {
                original
            };

            if compressed > original {
                return Err(corrupt(format!(
                    "chunk of {compressed} bytes expands to only {original} bytes"
                )));
            }
            if compressed > self.remaining.len() as u64 {
                return Err(corrupt(format!(
                    "chunk of {compressed} bytes runs past the end of the block"
                )));
            }

            self.produced = self.produced.saturating_add(original);
            if self.produced > self.limit {
                return Err(DecompressionError::TooLarge { limit: self.limit });
            }

            let (data, rest) = self.remaining.split_at(compressed as usize);
            self.remaining = rest;
            self.offset = 0;
            self.chunk.clear();

            if flags & CHUNK_COMPRESSED != 0 {
                self.chunk.resize(original as usize, 0);
                let written = lz4_flex::block::decompress_into(data, &mut self.chunk).map_err(
                    |e| DecompressionError::Corrupt(io::Error::new(io::ErrorKind::InvalidData, e)),
                )?;
                if written as u64 != original {
                    return Err(corrupt(format!(
                        "chunk decompressed to {written} bytes, expected {original}"
                    )));
                }
            } else {
                self.chunk.extend_from_slice(data);
            }

            trace!(flags, original, compressed, "decoded chunk");
            if !self.chunk.is_empty() {
                return Ok(true);
            }
        }
    }

    /// Decompress the rest of the block into memory
    #[instrument(skip(self), err)]
    pub fn read_payload(mut self) -> Result<Vec<u8>> {
        let mut payload = self.chunk.split_off(self.offset);
        while self.next_chunk()? {
            payload.extend_from_slice(&self.chunk);
        }

        Ok(payload)
    }
}

impl Read for HeaderBlockReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.offset == self.chunk.len() {
            if !self.next_chunk().map_err(io::Error::other)? {
                return Ok(0);
            }
        }

        let count = buf.len().min(self.chunk.len() - self.offset);
        buf[..count].copy_from_slice(&self.chunk[self.offset..self.offset + count]);
        self.offset += count;
        Ok(count)
    }
}

/// Decompress a header block, returning a payload that can be parsed more than once
pub fn decompress_block(block: &[u8], limit: u64) -> Result<Vec<u8>> {
    HeaderBlockReader::new(block, limit).read_payload()
}

#[cfg(test)]
pub(crate) mod test {
    use std::io::Read;

    use pretty_assertions::assert_eq;

    use crate::compression::{
        decompress_block, HeaderBlockReader, CHUNK_COMPRESSED, CHUNK_HIGH_COMPRESSION,
    };
    use crate::error::{DecompressionError, Error, Result};

    pub(crate) fn varint(mut value: u64, out: &mut Vec<u8>) {
        while value >= 0x80 {
            out.push(value as u8 | 0x80);
            value >>= 7;
        }
        out.push(value as u8);
    }

    /// Always stores the chunk as an LZ4 block, whatever its size
    pub(crate) fn compressed_chunk(flags: u64, data: &[u8], out: &mut Vec<u8>) {
        let packed = lz4_flex::block::compress(data);
        varint(flags | CHUNK_COMPRESSED, out);
        varint(data.len() as u64, out);
        varint(packed.len() as u64, out);
        out.extend_from_slice(&packed);
    }

    pub(crate) fn stored_chunk(flags: u64, data: &[u8], out: &mut Vec<u8>) {
        varint(flags & !CHUNK_COMPRESSED, out);
        varint(data.len() as u64, out);
        out.extend_from_slice(data);
    }

    /// Split `data` into chunks, compressing only those that shrink
    pub(crate) fn compress_chunked(data: &[u8], chunk_size: usize) -> Vec<u8> {
        let mut block = Vec::new();
        for chunk in data.chunks(chunk_size) {
            if lz4_flex::block::compress(chunk).len() < chunk.len() {
                compressed_chunk(0, chunk, &mut block);
            } else {
                stored_chunk(0, chunk, &mut block);
            }
        }
        block
    }

    pub(crate) fn compress(data: &[u8]) -> Vec<u8> {
        compress_chunked(data, 1 << 20)
    }

    #[test]
    fn decompress_compressed_chunk() -> Result<()> {
        let json = br#"{"root":{"parts":{"x":10}}}"#;
        let mut block = Vec::new();
        compressed_chunk(0, json, &mut block);

        assert_eq!(decompress_block(&block, 1024)?, json.to_vec());

        Ok(())
    }

    #[test]
    fn decompress_stored_chunk() -> Result<()> {
        let mut block = Vec::new();
        stored_chunk(0, b"{}", &mut block);

        assert_eq!(block, vec![0x00, 0x02, b'{', b'}']);
        assert_eq!(decompress_block(&block, 1024)?, b"{}".to_vec());

        Ok(())
    }

    #[test]
    fn decompress_ignores_high_compression_flag() -> Result<()> {
        let mut block = Vec::new();
        compressed_chunk(CHUNK_HIGH_COMPRESSION, b"aaaaaaaaaaaaaaaaaaaaaaaa", &mut block);
        stored_chunk(CHUNK_HIGH_COMPRESSION, b"bb", &mut block);

        assert_eq!(block[0], 0x03);
        assert_eq!(
            decompress_block(&block, 1024)?,
            b"aaaaaaaaaaaaaaaaaaaaaaaabb".to_vec()
        );

        Ok(())
    }

    #[test]
    fn decompress_many_chunks() -> Result<()> {
        let data = "0123456789".repeat(500);
        let block = compress_chunked(data.as_bytes(), 300);

        assert_eq!(decompress_block(&block, u64::MAX)?, data.into_bytes());

        Ok(())
    }

    #[test]
    fn decompress_skips_empty_chunks() -> Result<()> {
        let mut block = Vec::new();
        stored_chunk(0, b"", &mut block);
        stored_chunk(0, b"ab", &mut block);
        stored_chunk(0, b"", &mut block);

        assert_eq!(decompress_block(&block, 1024)?, b"ab".to_vec());

        Ok(())
    }

    #[test]
    fn decompress_empty_block() -> Result<()> {
        assert!(decompress_block(&[], 1024)?.is_empty());

        Ok(())
    }

    #[test]
    fn decompress_in_small_reads() -> Result<()> {
        let data = "0123456789".repeat(500);
        let block = compress_chunked(data.as_bytes(), 128);

        let mut reader = HeaderBlockReader::new(&block, u64::MAX);
        let mut output = Vec::new();
        let mut buffer = [0u8; 7];
        loop {
            let read = reader.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            output.extend_from_slice(&buffer[..read]);
        }

        assert_eq!(output, data.into_bytes());

        Ok(())
    }

    #[test]
    fn decompress_exactly_at_limit() -> Result<()> {
        let block = compress(&[b'a'; 64]);

        assert_eq!(decompress_block(&block, 64)?.len(), 64);

        Ok(())
    }

    #[test]
    fn decompress_over_limit() {
        let block = compress(&[b'a'; 65]);

        assert!(matches!(
            decompress_block(&block, 64),
            Err(Error::DecompressionError(DecompressionError::TooLarge { limit: 64 }))
        ));
    }

    #[test]
    fn decompress_declared_size_over_limit() {
        let mut block = Vec::new();
        varint(CHUNK_COMPRESSED, &mut block);
        varint(1 << 40, &mut block);
        varint(4, &mut block);
        block.extend_from_slice(&[0x00; 4]);

        assert!(matches!(
            decompress_block(&block, 1 << 20),
            Err(Error::DecompressionError(DecompressionError::TooLarge { .. }))
        ));
    }

    #[test]
    fn decompress_rejects_passes() {
        let mut block = Vec::new();
        stored_chunk(0, b"ab", &mut block);
        block[0] = 0x04;

        assert!(matches!(
            decompress_block(&block, 1024),
            Err(Error::DecompressionError(DecompressionError::Corrupt(_)))
        ));
    }

    #[test]
    fn decompress_truncated_chunk() {
        let mut block = Vec::new();
        compressed_chunk(0, "0123456789".repeat(50).as_bytes(), &mut block);
        block.truncate(block.len() - 3);

        assert!(matches!(
            decompress_block(&block, 1024),
            Err(Error::DecompressionError(DecompressionError::Corrupt(_)))
        ));
    }

    #[test]
    fn decompress_truncated_varint() {
        assert!(matches!(
            decompress_block(&[0x01, 0x80], 1024),
            Err(Error::DecompressionError(DecompressionError::Corrupt(_)))
        ));
        assert!(matches!(
            decompress_block(&[0x01], 1024),
            Err(Error::DecompressionError(DecompressionError::Corrupt(_)))
        ));
    }

    #[test]
    fn decompress_corrupt_block_data() {
        let block = [CHUNK_COMPRESSED as u8, 0x20, 0x04, 0xF0, 0xFF, 0xFF, 0xFF];

        assert!(matches!(
            decompress_block(&block, 1024),
            Err(Error::DecompressionError(DecompressionError::Corrupt(_)))
        ));
    }

    #[test]
    fn decompress_frame_format_rejected() {
        let frame = [0x04, 0x22, 0x4D, 0x18, 0x64, 0x40, 0xA7];

        assert!(decompress_block(&frame, 1024).is_err());
    }
}
