//! Locating and decoding the file tail.
//!
//! The tail is read with at most two storage reads: a speculative read of the
//! last [`DEFAULT_INITIAL_READ_SIZE`] bytes, and, only when the footer and
//! metadata turn out to be larger, one more read of exactly the missing
//! prefix. [`TailLocator`] drives this as an explicit state machine.

use std::time::SystemTime;

use bytes::{Bytes, BytesMut};
use log::debug;
use serde::Serialize;

use crate::codec::CodecPool;
use crate::error::{OrcTailError, Result};
use crate::footer::{Footer, decode_footer};
use crate::postscript::{MAGIC, Postscript, check_magic, decode_postscript};
use crate::source::ByteSource;
use crate::version::{FileVersion, check_compatibility};

/// Bytes read from the end of the file before anything is known about the tail.
pub const DEFAULT_INITIAL_READ_SIZE: u64 = 16 * 1024;

/// Smallest first read: the length byte plus the longest possible postscript.
pub const MIN_INITIAL_READ_SIZE: u64 = 1 + u8::MAX as u64;

/// Decoded tail of one file. Immutable once built and shareable between readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileTail {
    /// Decoded postscript.
    pub postscript: Postscript,
    /// Length of the encoded postscript, the final byte of the file.
    pub postscript_length: u8,
    /// Decoded footer.
    pub footer: Footer,
    /// Length of the whole file.
    pub file_length: u64,
    /// The encoded tail: metadata, footer, postscript and the length byte.
    #[serde(skip)]
    pub serialized_tail: Bytes,
    /// Modification time reported by storage, when known.
    pub modification_time: Option<SystemTime>,
}

impl FileTail {
    /// Tail of a zero byte file: an empty struct with no rows.
    pub fn empty() -> Self {
        Self {
            postscript: Postscript::empty(),
            postscript_length: 0,
            footer: Footer::empty(),
            file_length: 0,
            serialized_tail: Bytes::new(),
            modification_time: None,
        }
    }

    /// Decode a tail held in memory, e.g. one produced by [`FileTail::serialized_tail`].
    ///
    /// `buffer` must end with the postscript length byte and contain at least
    /// the metadata, footer and postscript; leading bytes are ignored.
    ///
    /// A postscript without the magic is accepted when `buffer` is exactly the
    /// tail, as [`FileTail::serialized_tail`] returns it for 0.11 files.
    /// Longer buffers must then start with the file header.
    pub fn parse(
        buffer: Bytes,
        file_length: u64,
        modification_time: Option<SystemTime>,
        pool: &CodecPool,
    ) -> Result<Self> {
        let ps_len = buffer.last().copied().unwrap_or(0) as usize;
        check_magic(&buffer, ps_len, || {
            let exact = decode_postscript(&buffer)
                .and_then(|(postscript, ps_len)| tail_size(&postscript, ps_len))
                .is_ok_and(|size| size == buffer.len() as u64);
            Ok(if exact {
                Bytes::from_static(MAGIC)
            } else {
                buffer.clone()
            })
        })?;
        let (postscript, ps_len) = decode_postscript(&buffer)?;
        let tail_size = tail_size(&postscript, ps_len)?;
        if (buffer.len() as u64) < tail_size {
            return Err(OrcTailError::truncated(format!(
                "tail needs {tail_size} bytes but only {} were supplied",
                buffer.len()
            )));
        }
        let tail = buffer.slice(buffer.len() - tail_size as usize..);
        finish_tail(tail, postscript, ps_len, file_length, modification_time, pool)
    }

    /// Encoded tail bytes, suitable for caching and for [`FileTail::parse`].
    pub fn serialized_tail(&self) -> Bytes {
        self.serialized_tail.clone()
    }

    /// Encoded stripe statistics block, the leading part of the serialized tail.
    ///
    /// `None` when the block is not empty but the tail bytes are not held.
    pub fn metadata_bytes(&self) -> Option<Bytes> {
        let len = self.postscript.metadata_length as usize;
        if len == 0 {
            return Some(Bytes::new());
        }
        (self.serialized_tail.len() >= len).then(|| self.serialized_tail.slice(..len))
    }

    /// Features in use that this reader does not implement.
    pub fn unsupported_features(&self) -> Vec<String> {
        let mut features = self.postscript.unsupported_features();
        features.extend(self.footer.unsupported_features());
        features
    }

    /// Re-run the version compatibility check, for tails supplied by callers.
    pub fn check_compatibility(&self) -> Result<FileVersion> {
        check_compatibility(&self.postscript.version, &self.unsupported_features())
    }
}

/// Bytes from the start of the metadata block to the end of the file.
fn tail_size(postscript: &Postscript, ps_len: u8) -> Result<u64> {
    (1 + ps_len as u64)
        .checked_add(postscript.footer_length)
        .and_then(|size| size.checked_add(postscript.metadata_length))
        .ok_or_else(|| {
            OrcTailError::malformed(format!(
                "footer length {} and metadata length {} overflow the tail size",
                postscript.footer_length, postscript.metadata_length
            ))
        })
}

/// Decode the footer of an exact tail buffer and assemble the [`FileTail`].
fn finish_tail(
    tail: Bytes,
    postscript: Postscript,
    ps_len: u8,
    file_length: u64,
    modification_time: Option<SystemTime>,
    pool: &CodecPool,
) -> Result<FileTail> {
    let ps_offset = tail.len() - 1 - ps_len as usize;
    let footer_offset = ps_offset - postscript.footer_length as usize;
    let footer = decode_footer(tail.slice(footer_offset..ps_offset), &postscript, pool)?;
    Ok(FileTail {
        postscript,
        postscript_length: ps_len,
        footer,
        file_length,
        serialized_tail: tail,
        modification_time,
    })
}

/// States of [`TailLocator`]. A failed step returns an error instead of a state.
#[derive(Debug)]
pub(crate) enum TailState {
    Start,
    SizeKnown {
        file_length: u64,
        modification_time: Option<SystemTime>,
    },
    InitialWindowRead {
        file_length: u64,
        modification_time: Option<SystemTime>,
        window: Bytes,
    },
    PostscriptParsed {
        file_length: u64,
        modification_time: Option<SystemTime>,
        window: Bytes,
        postscript: Postscript,
        ps_len: u8,
    },
    NeedsExpansion {
        file_length: u64,
        modification_time: Option<SystemTime>,
        window: Bytes,
        postscript: Postscript,
        ps_len: u8,
        missing: u64,
    },
    FooterReady {
        file_length: u64,
        modification_time: Option<SystemTime>,
        tail: Bytes,
        postscript: Postscript,
        ps_len: u8,
    },
    Done(Box<FileTail>),
}

impl TailState {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            TailState::Start => "Start",
            TailState::SizeKnown { .. } => "SizeKnown",
            TailState::InitialWindowRead { .. } => "InitialWindowRead",
            TailState::PostscriptParsed { .. } => "PostscriptParsed",
            TailState::NeedsExpansion { .. } => "NeedsExpansion",
            TailState::FooterReady { .. } => "FooterReady",
            TailState::Done(_) => "Done",
        }
    }
}

/// Reads and decodes the tail of one file.
#[derive(Debug)]
pub struct TailLocator<'a> {
    source: &'a dyn ByteSource,
    pool: &'a CodecPool,
    max_length: Option<u64>,
    initial_read_size: u64,
}

impl<'a> TailLocator<'a> {
    /// Locator over `source`, decompressing with codecs from `pool`.
    pub fn new(source: &'a dyn ByteSource, pool: &'a CodecPool) -> Self {
        Self {
            source,
            pool,
            max_length: None,
            initial_read_size: DEFAULT_INITIAL_READ_SIZE,
        }
    }

    /// Treat the file as `max_length` bytes long instead of asking storage.
    pub fn with_max_length(mut self, max_length: Option<u64>) -> Self {
        self.max_length = max_length;
        self
    }

    /// Size of the speculative first read, at least [`MIN_INITIAL_READ_SIZE`].
    pub fn with_initial_read_size(mut self, initial_read_size: u64) -> Self {
        self.initial_read_size = initial_read_size.max(MIN_INITIAL_READ_SIZE);
        self
    }

    /// Run the state machine to completion.
    pub fn locate(&self) -> Result<FileTail> {
        let mut state = TailState::Start;
        loop {
            state = match self.step(state)? {
                TailState::Done(tail) => return Ok(*tail),
                next => next,
            };
        }
    }

    /// Advance one state.
    pub(crate) fn step(&self, state: TailState) -> Result<TailState> {
        let next = match state {
            TailState::Start => {
                let (file_length, modification_time) = match self.max_length {
                    Some(len) => (len, None),
                    None => {
                        let status = self.source.status()?;
                        (status.len, status.modification_time)
                    }
                };
                if file_length == 0 {
                    // Writers commonly leave zero byte files behind as empty tables.
                    debug!("Zero length file, using an empty tail");
                    return Ok(TailState::Done(Box::new(FileTail {
                        modification_time,
                        ..FileTail::empty()
                    })));
                }
                if file_length <= MAGIC.len() as u64 {
                    return Err(OrcTailError::truncated(format!(
                        "{file_length} bytes is too short to be an ORC file"
                    )));
                }
                TailState::SizeKnown {
                    file_length,
                    modification_time,
                }
            }
            TailState::SizeKnown {
                file_length,
                modification_time,
            } => {
                let read_size = file_length.min(self.initial_read_size);
                let window = self
                    .source
                    .read_range(file_length - read_size, read_size as usize)?;
                TailState::InitialWindowRead {
                    file_length,
                    modification_time,
                    window,
                }
            }
            TailState::InitialWindowRead {
                file_length,
                modification_time,
                window,
            } => {
                let ps_len = window[window.len() - 1] as usize;
                check_magic(&window, ps_len, || {
                    Ok(self.source.read_range(0, MAGIC.len())?)
                })?;
                let (postscript, ps_len) = decode_postscript(&window)?;
                TailState::PostscriptParsed {
                    file_length,
                    modification_time,
                    window,
                    postscript,
                    ps_len,
                }
            }
            TailState::PostscriptParsed {
                file_length,
                modification_time,
                window,
                postscript,
                ps_len,
            } => {
                let tail_size = tail_size(&postscript, ps_len)?;
                if tail_size > file_length {
                    return Err(OrcTailError::truncated(format!(
                        "tail of {tail_size} bytes does not fit in a {file_length} byte file"
                    )));
                }
                let in_hand = window.len() as u64;
                if tail_size > in_hand {
                    TailState::NeedsExpansion {
                        file_length,
                        modification_time,
                        window,
                        postscript,
                        ps_len,
                        missing: tail_size - in_hand,
                    }
                } else {
                    let tail = window.slice((in_hand - tail_size) as usize..);
                    TailState::FooterReady {
                        file_length,
                        modification_time,
                        tail,
                        postscript,
                        ps_len,
                    }
                }
            }
            TailState::NeedsExpansion {
                file_length,
                modification_time,
                window,
                postscript,
                ps_len,
                missing,
            } => {
                debug!(
                    "Tail needs {missing} more bytes than the {} byte initial read",
                    window.len()
                );
                let start = file_length - window.len() as u64 - missing;
                let prefix = self.source.read_range(start, missing as usize)?;
                let mut tail = BytesMut::with_capacity(prefix.len() + window.len());
                tail.extend_from_slice(&prefix);
                tail.extend_from_slice(&window);
                TailState::FooterReady {
                    file_length,
                    modification_time,
                    tail: tail.freeze(),
                    postscript,
                    ps_len,
                }
            }
            TailState::FooterReady {
                file_length,
                modification_time,
                tail,
                postscript,
                ps_len,
            } => {
                let tail = finish_tail(
                    tail,
                    postscript,
                    ps_len,
                    file_length,
                    modification_time,
                    self.pool,
                )?;
                TailState::Done(Box::new(tail))
            }
            TailState::Done(tail) => TailState::Done(tail),
        };
        debug!("Tail locator moved to {}", next.name());
        Ok(next)
    }
}
