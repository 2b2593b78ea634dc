//! The reader: an opened file's tail plus everything derived from it.

use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use bytes::Bytes;
use log::debug;
use serde::Serialize;

use crate::config::ReaderOptions;
use crate::error::Result;
use crate::footer::{Footer, StripeInfo, TypeNode};
use crate::postscript::Postscript;
use crate::proto::CompressionKind;
use crate::schema::TypeTree;
use crate::source::ByteSource;
use crate::statistics::{
    ColumnStatistics, StatisticsView, StripeStatistics, raw_data_size_of_columns,
};
use crate::tail::{FileTail, TailLocator};
use crate::version::{FileVersion, WriterVersion};

/// Cacheable summary of a file, enough to reopen it without touching storage.
///
/// Unlike a [`FileTail`] it holds no encoded bytes, so stripe statistics are
/// only available when they were attached with
/// [`FileMetadata::with_stripe_statistics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileMetadata {
    /// Decoded postscript.
    pub postscript: Postscript,
    /// Decoded footer.
    pub footer: Footer,
    /// Length of the whole file.
    pub file_length: u64,
    /// Modification time reported by storage, when known.
    pub modification_time: Option<SystemTime>,
    /// Decoded stripe statistics, when attached.
    pub stripe_statistics: Option<Vec<StripeStatistics>>,
}

impl FileMetadata {
    /// Summarize `tail`, dropping its encoded bytes.
    pub fn from_tail(tail: &FileTail) -> Self {
        Self {
            postscript: tail.postscript.clone(),
            footer: tail.footer.clone(),
            file_length: tail.file_length,
            modification_time: tail.modification_time,
            stripe_statistics: None,
        }
    }

    /// Attach decoded stripe statistics.
    pub fn with_stripe_statistics(mut self, stripe_statistics: Vec<StripeStatistics>) -> Self {
        self.stripe_statistics = Some(stripe_statistics);
        self
    }

    fn to_tail(&self) -> FileTail {
        FileTail {
            postscript: self.postscript.clone(),
            postscript_length: 0,
            footer: self.footer.clone(),
            file_length: self.file_length,
            serialized_tail: Bytes::new(),
            modification_time: self.modification_time,
        }
    }
}

/// An opened ORC file.
///
/// All decoding happens in [`Reader::open`], except for stripe statistics,
/// which are decoded on first use. A reader is immutable and can be shared
/// between threads.
#[derive(Debug)]
pub struct Reader {
    tail: Arc<FileTail>,
    file_metadata: Option<Arc<FileMetadata>>,
    file_version: FileVersion,
    statistics: StatisticsView,
    use_utc_timestamps: bool,
    raw_data_size: OnceLock<u64>,
}

impl Reader {
    /// Open the file in `source`.
    ///
    /// Cached [`FileMetadata`] from the options is used as is, a cached
    /// [`FileTail`] is only checked for compatibility, and otherwise the tail
    /// is read from the storage override or from `source`.
    pub fn open(source: Arc<dyn ByteSource>, options: ReaderOptions) -> Result<Self> {
        let pool = options.codec_pool().clone();
        let (tail, file_metadata, statistics) = if let Some(metadata) = options.file_metadata() {
            debug!("Opening from cached file metadata");
            let tail = Arc::new(metadata.to_tail());
            let statistics =
                StatisticsView::with_decoded(metadata.stripe_statistics.clone(), pool);
            (tail, Some(metadata.clone()), statistics)
        } else {
            let tail = match options.file_tail() {
                Some(tail) => {
                    debug!("Opening from a cached file tail");
                    tail.clone()
                }
                None => {
                    let storage = options.storage().unwrap_or(&source);
                    let tail = TailLocator::new(storage.as_ref(), &pool)
                        .with_max_length(options.max_length())
                        .with_initial_read_size(options.initial_read_size())
                        .locate()?;
                    Arc::new(tail)
                }
            };
            let statistics = StatisticsView::new(
                tail.metadata_bytes(),
                tail.postscript.compression,
                tail.postscript.compression_block_size,
                pool,
            );
            (tail, None, statistics)
        };

        // Tails from callers skipped decoding, so check them here as well.
        let file_version = tail.check_compatibility()?;
        tail.footer.validate()?;

        Ok(Self {
            tail,
            file_metadata,
            file_version,
            statistics,
            use_utc_timestamps: options.use_utc_timestamps(),
            raw_data_size: OnceLock::new(),
        })
    }

    /// Navigator over the type tree.
    pub fn schema(&self) -> TypeTree<'_> {
        TypeTree::new(&self.tail.footer.types)
    }

    /// Type nodes, indexed by column id.
    pub fn types(&self) -> &[TypeNode] {
        &self.tail.footer.types
    }

    /// Stripe directory.
    pub fn stripes(&self) -> &[StripeInfo] {
        &self.tail.footer.stripes
    }

    /// Total rows in the file.
    pub fn number_of_rows(&self) -> u64 {
        self.tail.footer.number_of_rows
    }

    /// Bytes of stripe content.
    pub fn content_length(&self) -> u64 {
        self.tail.footer.content_length
    }

    /// Rows between row index entries.
    pub fn row_index_stride(&self) -> u32 {
        self.tail.footer.row_index_stride
    }

    /// Compression of footer, metadata and streams.
    pub fn compression(&self) -> CompressionKind {
        self.tail.postscript.compression
    }

    /// Largest decompressed chunk.
    pub fn compression_block_size(&self) -> u64 {
        self.tail.postscript.compression_block_size
    }

    /// Length of the encoded stripe statistics block.
    pub fn metadata_size(&self) -> u64 {
        self.tail.postscript.metadata_length
    }

    /// Raw version list from the postscript.
    pub fn version_list(&self) -> &[u32] {
        &self.tail.postscript.version
    }

    /// Resolved format version.
    pub fn file_version(&self) -> FileVersion {
        self.file_version
    }

    /// Resolved writer version.
    pub fn writer_version(&self) -> WriterVersion {
        self.tail.postscript.writer_version()
    }

    /// Keys of the user metadata, in file order.
    pub fn metadata_keys(&self) -> Vec<&str> {
        self.tail
            .footer
            .user_metadata
            .iter()
            .map(|item| item.name.as_str())
            .collect()
    }

    /// Value of the first user metadata item named `key`.
    pub fn metadata_value(&self, key: &str) -> Option<&Bytes> {
        self.tail
            .footer
            .user_metadata
            .iter()
            .find(|item| item.name == key)
            .map(|item| &item.value)
    }

    /// File level column statistics, aligned with [`Reader::types`].
    pub fn file_statistics(&self) -> &[ColumnStatistics] {
        &self.tail.footer.statistics
    }

    /// Per-stripe statistics, decoded on first call.
    pub fn stripe_statistics(&self) -> Result<Arc<[StripeStatistics]>> {
        self.statistics.stripe_statistics()
    }

    /// Estimated in-memory size of every column.
    pub fn raw_data_size(&self) -> u64 {
        *self.raw_data_size.get_or_init(|| {
            let ids: Vec<u32> = (0..self.types().len() as u32).collect();
            self.raw_data_size_of_columns(&ids)
        })
    }

    /// Estimated in-memory size of the given column ids.
    pub fn raw_data_size_of_columns(&self, column_ids: &[u32]) -> u64 {
        raw_data_size_of_columns(self.types(), self.file_statistics(), column_ids)
    }

    /// Estimated in-memory size of the named root fields, including nested columns.
    ///
    /// Names that do not resolve are logged and contribute nothing.
    pub fn raw_data_size_of_fields<S: AsRef<str>>(&self, names: &[S]) -> u64 {
        let ids = self.schema().column_ids_for_fields(names);
        self.raw_data_size_of_columns(&ids)
    }

    /// Encoded tail, or `None` when the reader was opened from [`FileMetadata`].
    pub fn serialized_tail(&self) -> Option<Bytes> {
        (self.file_metadata.is_none() && self.tail.file_length > 0)
            .then(|| self.tail.serialized_tail())
    }

    /// The decoded tail.
    pub fn file_tail(&self) -> &Arc<FileTail> {
        &self.tail
    }

    /// Whether timestamps are read as UTC.
    pub fn use_utc_timestamps(&self) -> bool {
        self.use_utc_timestamps
    }

    /// Metadata the reader was opened from, if any.
    pub fn file_metadata(&self) -> Option<&Arc<FileMetadata>> {
        self.file_metadata.as_ref()
    }

    /// Length of the file.
    pub fn file_length(&self) -> u64 {
        self.tail.file_length
    }

    /// Modification time reported by storage, when known.
    pub fn modification_time(&self) -> Option<SystemTime> {
        self.tail.modification_time
    }
}
