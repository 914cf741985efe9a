//! Types for reading AXRP headers
//!

use std::{io::Cursor, time::Duration};

use binrw::BinRead;
use bon::Builder;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace};

use crate::{
    compression::decompress_block,
    error::{CancelReason, Error, FormatError, Result},
    parse::parse_header,
    types::{LoadedHeader, Prologue, PROLOGUE_SIZE},
};

/// Size of the intermediate buffer used when copying blocks out of a stream
pub const READ_CHUNK_SIZE: usize = 1 << 14;

/// Default cap on the declared size of the compressed header block
pub const DEFAULT_MAX_HEADER_LENGTH: u32 = 64 << 20;

/// Default cap on the size of the decompressed header payload
pub const DEFAULT_MAX_DECOMPRESSED_SIZE: u64 = 256 << 20;

/// Options for how a header should be loaded
///
/// ```
/// use std::time::Duration;
/// use axrp_archive::read::LoadOptions;
/// use tokio_util::sync::CancellationToken;
///
/// let token = CancellationToken::new();
/// let options = LoadOptions::builder()
///     .max_header_length(1 << 20)
///     .read_timeout(Duration::from_secs(5))
///     .cancellation(token.clone())
///     .build();
///
/// assert_eq!(options.max_header_length, 1 << 20);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct LoadOptions {
    /// Largest compressed header block that will be read
    #[builder(default = DEFAULT_MAX_HEADER_LENGTH)]
    pub max_header_length: u32,

    /// Largest payload the header block may decompress to
    #[builder(default = DEFAULT_MAX_DECOMPRESSED_SIZE)]
    pub max_decompressed_size: u64,

    /// How long a single read may wait for data
    pub read_timeout: Option<Duration>,

    /// Aborts the load when cancelled
    pub cancellation: Option<CancellationToken>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Read once from `source`, giving up early if the load is cancelled or times out
async fn read_some<R>(source: &mut R, buf: &mut [u8], options: &LoadOptions) -> Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let read = async {
        match options.read_timeout {
            Some(limit) => match tokio::time::timeout(limit, source.read(buf)).await {
                Ok(result) => result.map_err(Error::from),
                Err(_) => Err(Error::from(CancelReason::TimedOut(limit))),
            },
            None => source.read(buf).await.map_err(Error::from),
        }
    };

    match &options.cancellation {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(Error::from(CancelReason::Requested)),
                result = read => result,
            }
        }
        None => read.await,
    }
}

async fn copy_exact<R, W>(
    source: &mut R,
    target: &mut W,
    byte_count: u64,
    options: &LoadOptions,
) -> Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buffer = vec![0u8; READ_CHUNK_SIZE.min(byte_count as usize)];
    let mut bytes_left = byte_count;

    while bytes_left > 0 {
        let wanted = buffer.len().min(bytes_left as usize);
        let bytes_read = read_some(source, &mut buffer[..wanted], options).await?;
        if bytes_read == 0 {
            return Err(Error::TruncatedInput {
                expected: byte_count,
                received: byte_count - bytes_left,
            });
        }

        target.write_all(&buffer[..bytes_read]).await?;
        bytes_left -= bytes_read as u64;
        trace!(bytes_read, bytes_left, "copied");
    }

    Ok(())
}

/// Copy exactly `byte_count` bytes from `source` into `target`.
///
/// Short reads are retried until the count is reached. If the source ends first, nothing more
/// is written and [`Error::TruncatedInput`] is returned.
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> axrp_archive::error::Result<()> {
/// let mut source: &[u8] = b"content part";
/// let mut target: Vec<u8> = Vec::new();
///
/// axrp_archive::read::read_bytes(&mut source, &mut target, 7).await?;
/// assert_eq!(target, b"content");
/// # Ok(())
/// # }
/// ```
#[instrument(skip(source, target), err)]
pub async fn read_bytes<R, W>(source: &mut R, target: &mut W, byte_count: u64) -> Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    copy_exact(source, target, byte_count, &LoadOptions::default()).await
}

#[instrument(skip_all, err)]
async fn read_prologue<R>(source: &mut R, options: &LoadOptions) -> Result<Prologue>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut raw: Vec<u8> = Vec::with_capacity(PROLOGUE_SIZE);
    copy_exact(source, &mut raw, PROLOGUE_SIZE as u64, options).await?;

    let prologue = Prologue::read(&mut Cursor::new(&raw)).map_err(|e| match e {
        binrw::Error::BadMagic { .. } => Error::from(FormatError::BadMagic([raw[0], raw[1]])),
        other => Error::from(other),
    })?;

    if prologue.header_length > options.max_header_length {
        return Err(FormatError::HeaderTooLarge {
            length: prologue.header_length,
            limit: options.max_header_length,
        }
        .into());
    }

    debug!(
        header_length = prologue.header_length,
        reserved = ?prologue.reserved,
        "read prologue"
    );
    Ok(prologue)
}

/// Load the header of an archive with the default [`LoadOptions`].
///
/// ```no_run
/// # #[tokio::main]
/// # async fn main() -> axrp_archive::error::Result<()> {
/// let mut file = tokio::fs::File::open("project.axrp").await?;
/// let loaded = axrp_archive::load_header(&mut file).await?;
///
/// for (path, offset) in loaded.header.root.walk() {
///     println!("{path}: {offset}");
/// }
/// println!("content starts at {}", loaded.content_offset());
/// # Ok(())
/// # }
/// ```
pub async fn load_header<R: AsyncRead + Unpin>(source: R) -> Result<LoadedHeader> {
    load_header_with(source, &LoadOptions::default()).await
}

/// Load the header of an archive.
///
/// Reads the prologue and the compressed header block from `source`, leaving the stream
/// positioned at [`LoadedHeader::content_offset`]. Nothing past the header block is read.
#[instrument(skip_all, err)]
pub async fn load_header_with<R: AsyncRead + Unpin>(
    mut source: R,
    options: &LoadOptions,
) -> Result<LoadedHeader> {
    let prologue = read_prologue(&mut source, options).await?;
    let header_length = prologue.header_length;

    let mut block: Vec<u8> = Vec::with_capacity(READ_CHUNK_SIZE.min(header_length as usize));
    copy_exact(&mut source, &mut block, header_length as u64, options).await?;

    let payload = decompress_block(&block, options.max_decompressed_size)?;
    drop(block);

    let parsed = parse_header(&payload)?;
    let shape = parsed.shape();
    let header = parsed.into_header();

    info!(
        header_length,
        %shape,
        groups = header.root.group_count(),
        parts = header.root.part_count(),
        "loaded header"
    );

    Ok(LoadedHeader {
        header,
        header_length,
        shape,
    })
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use tokio::io::AsyncWriteExt;
    use tokio_util::sync::CancellationToken;

    use crate::compression::test::compress;
    use crate::error::{CancelReason, Error, FormatError, Result};
    use crate::read::{load_header, load_header_with, read_bytes, LoadOptions};
    use crate::types::HeaderShape;

    fn archive(json: &str) -> Vec<u8> {
        let block = compress(json.as_bytes());

        let mut data = vec![0xAC, 0xEF, 0x0A, 0x00];
        data.extend_from_slice(&(block.len() as u32).to_le_bytes());
        data.extend_from_slice(&block);
        data
    }

    #[tokio::test]
    async fn read_wrapped_header() -> Result<()> {
        let input = archive(r#"{"root":{"children":{"A":{"parts":{"x":10}}},"parts":{}}}"#);

        let loaded = load_header(input.as_slice()).await?;
        assert_eq!(loaded.shape, HeaderShape::Wrapped);
        assert_eq!(loaded.header.root.children["A"].parts["x"], 10);
        assert_eq!(loaded.header_length as usize, input.len() - 8);
        assert_eq!(loaded.content_offset(), input.len() as u64);

        Ok(())
    }

    #[tokio::test]
    async fn read_bare_header() -> Result<()> {
        let input = archive(r#"{"children":{"A":{"parts":{"x":10}}}}"#);

        let loaded = load_header(input.as_slice()).await?;
        assert_eq!(loaded.shape, HeaderShape::Bare);
        assert_eq!(loaded.header.root.find_part("A/x"), Some(10));

        Ok(())
    }

    #[tokio::test]
    async fn read_invalid_magic() {
        let mut input = archive(r#"{"root":{}}"#);
        input[0] = 0xFF;

        let result = load_header(input.as_slice()).await;
        assert!(matches!(
            result,
            Err(Error::InvalidFormat(FormatError::BadMagic([0xFF, 0xEF])))
        ));
    }

    #[tokio::test]
    async fn read_header_too_large() {
        let input = archive(r#"{"root":{}}"#);
        let options = LoadOptions::builder().max_header_length(4).build();

        let result = load_header_with(input.as_slice(), &options).await;
        assert!(matches!(
            result,
            Err(Error::InvalidFormat(FormatError::HeaderTooLarge { limit: 4, .. }))
        ));
    }

    #[tokio::test]
    async fn read_short_prologue() {
        let input = [0xAC, 0xEF, 0x0A];

        let result = load_header(input.as_slice()).await;
        assert!(matches!(
            result,
            Err(Error::TruncatedInput {
                expected: 8,
                received: 3
            })
        ));
    }

    #[tokio::test]
    async fn read_bytes_exact() -> Result<()> {
        let mut source: &[u8] = &[1, 2, 3, 4, 5, 6];
        let mut target: Vec<u8> = Vec::new();

        read_bytes(&mut source, &mut target, 4).await?;
        assert_eq!(target, vec![1, 2, 3, 4]);
        assert_eq!(source, &[5, 6]);

        read_bytes(&mut source, &mut target, 0).await?;
        assert_eq!(target.len(), 4);

        Ok(())
    }

    #[tokio::test]
    async fn read_bytes_across_chunks() -> Result<()> {
        let data: Vec<u8> = (0..40_000u32).map(|i| i as u8).collect();
        let mut source = data.as_slice();
        let mut target: Vec<u8> = Vec::new();

        read_bytes(&mut source, &mut target, data.len() as u64).await?;
        assert_eq!(target, data);

        Ok(())
    }

    #[tokio::test]
    async fn read_cancelled() {
        let (_writer, reader) = tokio::io::duplex(64);
        let token = CancellationToken::new();
        token.cancel();

        let options = LoadOptions::builder().cancellation(token).build();
        let result = load_header_with(reader, &options).await;

        assert!(matches!(
            result,
            Err(Error::Cancelled(CancelReason::Requested))
        ));
    }

    #[tokio::test]
    async fn read_cancelled_while_waiting() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let token = CancellationToken::new();

        let input = archive(r#"{"root":{}}"#);
        writer.write_all(&input[..10]).await.unwrap();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let options = LoadOptions::builder().cancellation(token).build();
        let result = load_header_with(reader, &options).await;

        assert!(matches!(
            result,
            Err(Error::Cancelled(CancelReason::Requested))
        ));
        drop(writer);
    }

    #[tokio::test]
    async fn read_timed_out() {
        let (_writer, reader) = tokio::io::duplex(64);

        let options = LoadOptions::builder()
            .read_timeout(Duration::from_millis(20))
            .build();
        let result = load_header_with(reader, &options).await;

        assert!(matches!(
            result,
            Err(Error::Cancelled(CancelReason::TimedOut(_)))
        ));
    }
}
