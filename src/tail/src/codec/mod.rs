//! Decompressors for the compression kinds an ORC tail may use.

mod pool;
mod stream;

pub use pool::{CodecPool, DEFAULT_MAX_IDLE_PER_KIND, PooledDecompressor};
pub use stream::decompress_stream;

use std::fmt::Debug;
use std::io;

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::{OrcTailError, Result};
use crate::proto::CompressionKind;

/// A reusable decompressor for one compression kind.
///
/// Instances keep internal state between calls and are therefore pooled
/// rather than rebuilt for every chunk.
pub trait Decompressor: Send {
    /// Kind this instance decodes.
    fn kind(&self) -> CompressionKind;

    /// Decompress one chunk whose output is at most `max_output` bytes.
    fn decompress(&mut self, input: &[u8], max_output: usize) -> io::Result<Vec<u8>>;

    /// Clear per-stream state before the instance is reused.
    fn reset(&mut self) {}
}

impl Debug for dyn Decompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Decompressor({})", self.kind())
    }
}

/// Build a fresh decompressor.
pub fn create_decompressor(kind: CompressionKind) -> Result<Box<dyn Decompressor>> {
    match kind {
        CompressionKind::Zlib => Ok(Box::new(ZlibDecompressor::new())),
        CompressionKind::Snappy => Ok(Box::new(SnappyDecompressor::new())),
        CompressionKind::Lz4 => Ok(Box::new(Lz4Decompressor)),
        CompressionKind::Zstd => Ok(Box::new(ZstdDecompressor::new()?)),
        CompressionKind::None | CompressionKind::Lzo => Err(OrcTailError::CodecUnavailable(kind)),
    }
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// Raw deflate, without the zlib header.
struct ZlibDecompressor {
    inflate: Decompress,
}

impl ZlibDecompressor {
    fn new() -> Self {
        Self {
            inflate: Decompress::new(false),
        }
    }
}

impl ZlibDecompressor {
    /// Inflate into a buffer that grows with the output, up to `max_output`.
    fn inflate_chunk(&mut self, input: &[u8], max_output: usize) -> io::Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len().saturating_mul(4).min(max_output).max(64));
        loop {
            let consumed = self.inflate.total_in() as usize;
            let status = self
                .inflate
                .decompress_vec(&input[consumed..], &mut output, FlushDecompress::Finish)
                .map_err(|e| invalid_data(format!("zlib: {e}")))?;
            if output.len() > max_output {
                break;
            }
            match status {
                Status::StreamEnd => return Ok(output),
                // Out of room: grow and continue.
                Status::Ok | Status::BufError
                    if output.len() == output.capacity() && output.len() < max_output =>
                {
                    let additional = output.len().min(max_output - output.len());
                    output.reserve_exact(additional);
                }
                Status::Ok | Status::BufError => break,
            }
        }
        Err(invalid_data(format!(
            "zlib: chunk did not end within {max_output} bytes"
        )))
    }
}

impl Decompressor for ZlibDecompressor {
    fn kind(&self) -> CompressionKind {
        CompressionKind::Zlib
    }

    fn decompress(&mut self, input: &[u8], max_output: usize) -> io::Result<Vec<u8>> {
        let result = self.inflate_chunk(input, max_output);
        self.inflate.reset(false);
        result
    }

    fn reset(&mut self) {
        self.inflate.reset(false);
    }
}

struct SnappyDecompressor {
    decoder: snap::raw::Decoder,
}

impl SnappyDecompressor {
    fn new() -> Self {
        Self {
            decoder: snap::raw::Decoder::new(),
        }
    }
}

impl Decompressor for SnappyDecompressor {
    fn kind(&self) -> CompressionKind {
        CompressionKind::Snappy
    }

    fn decompress(&mut self, input: &[u8], max_output: usize) -> io::Result<Vec<u8>> {
        let len = snap::raw::decompress_len(input).map_err(|e| invalid_data(format!("snappy: {e}")))?;
        if len > max_output {
            return Err(invalid_data(format!(
                "snappy: chunk of {len} bytes exceeds the {max_output} byte block size"
            )));
        }
        self.decoder
            .decompress_vec(input)
            .map_err(|e| invalid_data(format!("snappy: {e}")))
    }
}

/// Raw LZ4 blocks; stateless.
struct Lz4Decompressor;

impl Decompressor for Lz4Decompressor {
    fn kind(&self) -> CompressionKind {
        CompressionKind::Lz4
    }

    fn decompress(&mut self, input: &[u8], max_output: usize) -> io::Result<Vec<u8>> {
        lz4_flex::block::decompress(input, max_output).map_err(|e| invalid_data(format!("lz4: {e}")))
    }
}

struct ZstdDecompressor {
    context: zstd::bulk::Decompressor<'static>,
}

impl ZstdDecompressor {
    fn new() -> io::Result<Self> {
        Ok(Self {
            context: zstd::bulk::Decompressor::new()?,
        })
    }
}

impl Decompressor for ZstdDecompressor {
    fn kind(&self) -> CompressionKind {
        CompressionKind::Zstd
    }

    fn decompress(&mut self, input: &[u8], max_output: usize) -> io::Result<Vec<u8>> {
        // Frames written with a pledged size say how much room they need.
        let capacity = match zstd::zstd_safe::get_frame_content_size(input) {
            Ok(Some(size)) if size > max_output as u64 => {
                return Err(invalid_data(format!(
                    "zstd: chunk of {size} bytes exceeds the {max_output} byte block size"
                )));
            }
            Ok(Some(size)) => size as usize,
            _ => max_output,
        };
        self.context
            .decompress(input, capacity)
            .map_err(|e| invalid_data(format!("zstd: {e}")))
    }
}
