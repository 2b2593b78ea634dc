use std::sync::Arc;

use crate::codec::CodecPool;
use crate::reader::FileMetadata;
use crate::source::ByteSource;
use crate::tail::{DEFAULT_INITIAL_READ_SIZE, FileTail};

/// Options for [`crate::Reader::open`].
///
/// Example:
/// ```rust
/// use std::sync::Arc;
/// use orc_tail::{CodecPool, ReaderOptions};
///
/// let pool = Arc::new(CodecPool::new(4));
/// let options = ReaderOptions::new()
///     .with_codec_pool(pool.clone())
///     .with_initial_read_size(64 * 1024)
///     .with_use_utc_timestamps(true);
/// assert_eq!(options.initial_read_size(), 64 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    max_length: Option<u64>,
    file_tail: Option<Arc<FileTail>>,
    file_metadata: Option<Arc<FileMetadata>>,
    use_utc_timestamps: bool,
    storage: Option<Arc<dyn ByteSource>>,
    codec_pool: Arc<CodecPool>,
    initial_read_size: u64,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderOptions {
    /// Create options with every default.
    pub fn new() -> Self {
        Self {
            max_length: None,
            file_tail: None,
            file_metadata: None,
            use_utc_timestamps: false,
            storage: None,
            codec_pool: Arc::new(CodecPool::default()),
            initial_read_size: DEFAULT_INITIAL_READ_SIZE,
        }
    }

    /// Treat the file as this many bytes long, skipping the storage status call.
    /// Default is to ask storage.
    pub fn with_max_length(mut self, max_length: u64) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Use an already decoded tail instead of reading one.
    pub fn with_file_tail(mut self, file_tail: Arc<FileTail>) -> Self {
        self.file_tail = Some(file_tail);
        self
    }

    /// Use cached file metadata, skipping all tail parsing.
    /// Takes precedence over [`ReaderOptions::with_file_tail`].
    pub fn with_file_metadata(mut self, file_metadata: Arc<FileMetadata>) -> Self {
        self.file_metadata = Some(file_metadata);
        self
    }

    /// Interpret timestamps as UTC. Default is false.
    pub fn with_use_utc_timestamps(mut self, use_utc_timestamps: bool) -> Self {
        self.use_utc_timestamps = use_utc_timestamps;
        self
    }

    /// Read the tail from `storage` instead of the source passed to open.
    pub fn with_storage(mut self, storage: Arc<dyn ByteSource>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Share a decompressor pool between readers.
    /// Default is a private pool per options value.
    pub fn with_codec_pool(mut self, codec_pool: Arc<CodecPool>) -> Self {
        self.codec_pool = codec_pool;
        self
    }

    /// Size of the speculative read from the end of the file.
    /// Default is 16 KiB.
    pub fn with_initial_read_size(mut self, initial_read_size: u64) -> Self {
        self.initial_read_size = initial_read_size;
        self
    }

    /// Declared file length, if any.
    pub fn max_length(&self) -> Option<u64> {
        self.max_length
    }

    /// Supplied tail, if any.
    pub fn file_tail(&self) -> Option<&Arc<FileTail>> {
        self.file_tail.as_ref()
    }

    /// Supplied file metadata, if any.
    pub fn file_metadata(&self) -> Option<&Arc<FileMetadata>> {
        self.file_metadata.as_ref()
    }

    /// Whether timestamps are read as UTC.
    pub fn use_utc_timestamps(&self) -> bool {
        self.use_utc_timestamps
    }

    /// Storage override, if any.
    pub fn storage(&self) -> Option<&Arc<dyn ByteSource>> {
        self.storage.as_ref()
    }

    /// Pool decompressors are checked out from.
    pub fn codec_pool(&self) -> &Arc<CodecPool> {
        &self.codec_pool
    }

    /// Size of the speculative read.
    pub fn initial_read_size(&self) -> u64 {
        self.initial_read_size
    }
}
