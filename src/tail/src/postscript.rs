//! Postscript: the small uncompressed record in front of the final length byte.

use bytes::Bytes;
use prost::Message;
use serde::Serialize;

use crate::error::{OrcTailError, Result};
use crate::proto::{self, CompressionKind};
use crate::version::{FileVersion, WriterVersion};

/// Marker that ends every postscript (and starts legacy 0.11 files).
pub const MAGIC: &[u8; 3] = b"ORC";

/// Compression block size assumed when the postscript leaves it unset.
pub const DEFAULT_COMPRESSION_BLOCK_SIZE: u64 = 256 * 1024;

/// Largest compression block size: a chunk header stores lengths in 23 bits.
pub const MAX_COMPRESSION_BLOCK_SIZE: u64 = (1 << 23) - 1;

/// Decoded postscript.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Postscript {
    /// Length of the (possibly compressed) footer.
    pub footer_length: u64,
    /// Compression of footer, metadata and streams.
    pub compression: CompressionKind,
    /// Largest decompressed chunk.
    pub compression_block_size: u64,
    /// Raw `[major, minor]` version list.
    pub version: Vec<u32>,
    /// Length of the (possibly compressed) stripe statistics block.
    pub metadata_length: u64,
    /// Raw writer version id.
    pub writer_version: u32,
    /// Length of a separate stripe statistics section (newer writers only).
    pub stripe_statistics_length: Option<u64>,
    /// Magic string stored inside the record.
    pub magic: Option<String>,
}

impl Postscript {
    /// Postscript of a synthetic empty file.
    pub(crate) fn empty() -> Self {
        let (major, minor) = FileVersion::CURRENT
            .major_minor()
            .unwrap_or((0, 12));
        Self {
            footer_length: 0,
            compression: CompressionKind::None,
            compression_block_size: DEFAULT_COMPRESSION_BLOCK_SIZE,
            version: vec![major, minor],
            metadata_length: 0,
            writer_version: WriterVersion::CURRENT,
            stripe_statistics_length: None,
            magic: Some(String::from_utf8_lossy(MAGIC).into_owned()),
        }
    }

    /// Resolved format version.
    pub fn file_version(&self) -> Result<FileVersion> {
        FileVersion::from_version_list(&self.version)
    }

    /// Resolved writer version.
    pub fn writer_version(&self) -> WriterVersion {
        WriterVersion::from_id(self.writer_version)
    }

    /// Features this reader does not implement, named for error messages.
    pub fn unsupported_features(&self) -> Vec<String> {
        match self.stripe_statistics_length {
            Some(len) if len > 0 => vec!["separate stripe statistics section".to_string()],
            _ => Vec::new(),
        }
    }
}

impl TryFrom<proto::PostScript> for Postscript {
    type Error = OrcTailError;

    fn try_from(ps: proto::PostScript) -> Result<Self> {
        let raw_compression = ps.compression.unwrap_or(CompressionKind::None as i32);
        let compression = CompressionKind::try_from(raw_compression)
            .map_err(|_| OrcTailError::UnknownCompression(raw_compression))?;
        let compression_block_size = match ps.compression_block_size {
            Some(0) | None => DEFAULT_COMPRESSION_BLOCK_SIZE,
            Some(size) if size <= MAX_COMPRESSION_BLOCK_SIZE => size,
            Some(size) => {
                return Err(OrcTailError::malformed(format!(
                    "compression block size {size} exceeds {MAX_COMPRESSION_BLOCK_SIZE}"
                )));
            }
        };
        Ok(Self {
            footer_length: ps.footer_length.unwrap_or(0),
            compression,
            compression_block_size,
            version: ps.version,
            metadata_length: ps.metadata_length.unwrap_or(0),
            writer_version: ps.writer_version.unwrap_or(0),
            stripe_statistics_length: ps.stripe_statistics_length,
            magic: ps.magic,
        })
    }
}

/// Ensure the window ends with an ORC postscript.
///
/// `window` holds the last bytes of the file and `ps_len` is its final byte.
/// When the magic is missing from the postscript, the file may be a 0.11 file
/// that only carries it in its header; `header` is asked for the first
/// [`MAGIC`] length bytes of the file in that case.
pub fn check_magic(
    window: &[u8],
    ps_len: usize,
    header: impl FnOnce() -> Result<Bytes>,
) -> Result<()> {
    let full_length = MAGIC.len() + 1;
    if ps_len < full_length || window.len() < full_length {
        return Err(OrcTailError::malformed(format!(
            "invalid postscript length {ps_len}"
        )));
    }
    let offset = window.len() - full_length;
    if &window[offset..offset + MAGIC.len()] == MAGIC {
        return Ok(());
    }
    let header = header()?;
    if header.len() >= MAGIC.len() && &header[..MAGIC.len()] == MAGIC {
        return Ok(());
    }
    Err(OrcTailError::malformed("invalid postscript"))
}

/// Parse the postscript at the end of `window`.
///
/// Returns the postscript and its length (the final byte of the window).
pub fn decode_postscript(window: &[u8]) -> Result<(Postscript, u8)> {
    let Some(&ps_len) = window.last() else {
        return Err(OrcTailError::truncated("empty tail window"));
    };
    let ps_start = window.len() - 1;
    let Some(ps_offset) = ps_start.checked_sub(ps_len as usize) else {
        return Err(OrcTailError::truncated(format!(
            "postscript of {ps_len} bytes does not fit in a {} byte window",
            window.len()
        )));
    };
    let ps = proto::PostScript::decode(&window[ps_offset..ps_start])?;
    Ok((Postscript::try_from(ps)?, ps_len))
}
