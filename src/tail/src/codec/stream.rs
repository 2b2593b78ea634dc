//! Decoding of chunked compressed streams.

use bytes::{Bytes, BytesMut};

use super::CodecPool;
use crate::error::{OrcTailError, Result};
use crate::postscript::MAX_COMPRESSION_BLOCK_SIZE;
use crate::proto::CompressionKind;

const CHUNK_HEADER_SIZE: usize = 3;

/*
    A compressed ORC stream is a sequence of chunks:

    +-----------------------------+------------------------+
    | header (3 bytes, LE)        | body (`len` bytes)     |
    +-----------------------------+------------------------+

    header = (len << 1) | original
    original == 1 means the body is stored as is, because compressing it
    did not make it smaller.
*/

/// Decode the compressed stream `name` held in `input`.
///
/// `NONE` streams are returned unchanged. Otherwise a decompressor is checked
/// out of `pool` for the duration of the call and handed back before any
/// error is returned.
pub fn decompress_stream(
    name: &str,
    input: Bytes,
    kind: CompressionKind,
    block_size: u64,
    pool: &CodecPool,
) -> Result<Bytes> {
    if kind == CompressionKind::None {
        return Ok(input);
    }
    if block_size > MAX_COMPRESSION_BLOCK_SIZE {
        return Err(OrcTailError::malformed(format!(
            "{name}: compression block size {block_size} exceeds {MAX_COMPRESSION_BLOCK_SIZE}"
        )));
    }
    let block_size = block_size as usize;
    let mut codec = pool.checkout(kind)?;
    let mut output = BytesMut::with_capacity(input.len().saturating_mul(2));
    let mut pos = 0;
    while pos < input.len() {
        if input.len() - pos < CHUNK_HEADER_SIZE {
            return Err(OrcTailError::malformed(format!(
                "{name}: truncated chunk header at offset {pos}"
            )));
        }
        let header = u32::from(input[pos])
            | (u32::from(input[pos + 1]) << 8)
            | (u32::from(input[pos + 2]) << 16);
        let original = header & 1 == 1;
        let len = (header >> 1) as usize;
        pos += CHUNK_HEADER_SIZE;
        if len > input.len() - pos {
            return Err(OrcTailError::malformed(format!(
                "{name}: chunk of {len} bytes at offset {pos} runs past the end of a {} byte stream",
                input.len()
            )));
        }
        let chunk = &input[pos..pos + len];
        if original {
            if len > block_size {
                return Err(OrcTailError::malformed(format!(
                    "{name}: uncompressed chunk of {len} bytes exceeds the {block_size} byte block size"
                )));
            }
            output.extend_from_slice(chunk);
        } else {
            let decoded = codec
                .decompress(chunk, block_size)
                .map_err(|e| OrcTailError::malformed(format!("{name}: {e}")))?;
            output.extend_from_slice(&decoded);
        }
        pos += len;
    }
    Ok(output.freeze())
}
