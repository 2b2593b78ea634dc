//! Builders for synthetic ORC files, and end to end tests of [`Reader`].

use std::io::Write;
use std::sync::Arc;

use prost::Message;

use crate::proto::{self, CompressionKind};
use crate::source::{ByteSource, InMemorySource, LocalFile};
use crate::statistics::ColumnStatisticsKind;
use crate::tail::MIN_INITIAL_READ_SIZE;
use crate::{
    CodecPool, FileMetadata, FileTail, FileVersion, OrcTailError, Reader, ReaderOptions,
    WriterVersion,
};

/// Compress one chunk with the block format ORC uses for `kind`.
pub(crate) fn compress_chunk(kind: CompressionKind, data: &[u8]) -> Vec<u8> {
    match kind {
        CompressionKind::Zlib => {
            let mut encoder =
                flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(data).unwrap();
            encoder.finish().unwrap()
        }
        CompressionKind::Snappy => snap::raw::Encoder::new().compress_vec(data).unwrap(),
        CompressionKind::Lz4 => lz4_flex::block::compress(data),
        CompressionKind::Zstd => zstd::bulk::compress(data, 3).unwrap(),
        CompressionKind::None | CompressionKind::Lzo => unreachable!("no encoder for {kind}"),
    }
}

/// Encode `data` as a chunked stream, storing chunks as is when compression does not help.
pub(crate) fn compress_stream(kind: CompressionKind, block_size: u64, data: &[u8]) -> Vec<u8> {
    if kind == CompressionKind::None {
        return data.to_vec();
    }
    let mut out = Vec::new();
    for chunk in data.chunks(block_size as usize) {
        let compressed = compress_chunk(kind, chunk);
        let (body, original) = if compressed.len() < chunk.len() {
            (compressed.as_slice(), 0)
        } else {
            (chunk, 1)
        };
        let header = ((body.len() as u32) << 1) | original;
        out.extend_from_slice(&header.to_le_bytes()[..3]);
        out.extend_from_slice(body);
    }
    out
}

pub(crate) fn primitive(kind: i32) -> proto::Type {
    proto::Type {
        kind: Some(kind),
        ..Default::default()
    }
}

pub(crate) fn struct_type(fields: &[(&str, u32)]) -> proto::Type {
    proto::Type {
        kind: Some(12),
        subtypes: fields.iter().map(|(_, id)| *id).collect(),
        field_names: fields.iter().map(|(name, _)| name.to_string()).collect(),
        ..Default::default()
    }
}

fn list_type(child: u32) -> proto::Type {
    proto::Type {
        kind: Some(10),
        subtypes: vec![child],
        ..Default::default()
    }
}

fn stats(values: u64) -> proto::ColumnStatistics {
    proto::ColumnStatistics {
        number_of_values: Some(values),
        has_null: Some(false),
        ..Default::default()
    }
}

fn int_stats(values: u64, minimum: i64, maximum: i64) -> proto::ColumnStatistics {
    proto::ColumnStatistics {
        int_statistics: Some(proto::IntegerStatistics {
            minimum: Some(minimum),
            maximum: Some(maximum),
            sum: Some((minimum + maximum) * values as i64 / 2),
        }),
        ..stats(values)
    }
}

fn string_stats(values: u64, total_length: i64) -> proto::ColumnStatistics {
    proto::ColumnStatistics {
        string_statistics: Some(proto::StringStatistics {
            minimum: Some("a".to_string()),
            maximum: Some("zz".to_string()),
            sum: Some(total_length),
            ..Default::default()
        }),
        ..stats(values)
    }
}

fn double_stats(values: u64) -> proto::ColumnStatistics {
    proto::ColumnStatistics {
        double_statistics: Some(proto::DoubleStatistics {
            minimum: Some(0.5),
            maximum: Some(99.5),
            sum: Some(values as f64 * 50.0),
        }),
        has_null: Some(true),
        ..stats(values)
    }
}

/// Statistics for struct<id:int,name:string,tags:array<string>,score:double>.
fn column_stats(rows: u64) -> Vec<proto::ColumnStatistics> {
    vec![
        stats(rows),
        int_stats(rows, 1, rows as i64),
        string_stats(rows, rows as i64 * 5),
        stats(rows),
        string_stats(rows * 3, rows as i64 * 6),
        double_stats(rows - rows / 100),
    ]
}

/// Assembles the bytes of an ORC file around a synthetic tail.
#[derive(Debug, Clone)]
pub(crate) struct TailBuilder {
    pub compression: CompressionKind,
    pub raw_compression: Option<i32>,
    pub block_size: u64,
    pub version: Vec<u32>,
    pub padding: usize,
    pub header_magic: bool,
    pub postscript_magic: bool,
    pub footer: proto::Footer,
    pub metadata: Option<proto::Metadata>,
    pub encryption: bool,
    pub stripe_statistics_length: Option<u64>,
    pub footer_length_override: Option<u64>,
    pub block_size_override: Option<u64>,
}

impl TailBuilder {
    /// 1000 rows in two stripes of struct<id:int,name:string,tags:array<string>,score:double>.
    pub fn sample() -> Self {
        let stripes = vec![
            proto::StripeInformation {
                offset: Some(3),
                index_length: Some(10),
                data_length: Some(100),
                footer_length: Some(20),
                number_of_rows: Some(600),
            },
            proto::StripeInformation {
                offset: Some(133),
                index_length: Some(10),
                data_length: Some(80),
                footer_length: Some(20),
                number_of_rows: Some(400),
            },
        ];
        let footer = proto::Footer {
            header_length: Some(3),
            content_length: Some(243),
            stripes,
            types: vec![
                struct_type(&[("id", 1), ("name", 2), ("tags", 3), ("score", 5)]),
                primitive(3),
                primitive(7),
                list_type(4),
                primitive(7),
                primitive(6),
            ],
            metadata: vec![proto::UserMetadataItem {
                name: Some("owner".to_string()),
                value: Some(bytes::Bytes::from_static(b"etl")),
            }],
            number_of_rows: Some(1000),
            statistics: column_stats(1000),
            row_index_stride: Some(10_000),
            writer: Some(1),
            encryption: None,
            software_version: Some("orc-tail tests".to_string()),
        };
        let metadata = proto::Metadata {
            stripe_stats: vec![
                proto::StripeStatistics {
                    col_stats: column_stats(600),
                },
                proto::StripeStatistics {
                    col_stats: column_stats(400),
                },
            ],
        };
        Self {
            compression: CompressionKind::None,
            raw_compression: None,
            block_size: 1024,
            version: vec![0, 12],
            padding: 243,
            header_magic: true,
            postscript_magic: true,
            footer,
            metadata: Some(metadata),
            encryption: false,
            stripe_statistics_length: None,
            footer_length_override: None,
            block_size_override: None,
        }
    }

    pub fn compression(mut self, compression: CompressionKind) -> Self {
        self.compression = compression;
        self
    }

    pub fn version(mut self, version: Vec<u32>) -> Self {
        self.version = version;
        self
    }

    /// Bytes of stripe content between the header magic and the tail.
    pub fn padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    pub fn encryption(mut self, encryption: bool) -> Self {
        self.encryption = encryption;
        self
    }

    /// The footer message as it will be encoded.
    pub fn footer(&self) -> proto::Footer {
        let mut footer = self.footer.clone();
        if self.encryption {
            footer.encryption = Some(vec![0x0a, 0x02, 0x08, 0x01]);
        }
        footer
    }

    pub fn build(&self) -> Vec<u8> {
        let mut file = Vec::new();
        file.extend_from_slice(if self.header_magic { b"ORC" } else { b"XYZ" });
        file.extend(std::iter::repeat_n(0xab, self.padding));

        let metadata = self
            .metadata
            .as_ref()
            .map(|m| compress_stream(self.compression, self.block_size, &m.encode_to_vec()))
            .unwrap_or_default();
        let footer = compress_stream(
            self.compression,
            self.block_size,
            &self.footer().encode_to_vec(),
        );
        let postscript = proto::PostScript {
            footer_length: Some(self.footer_length_override.unwrap_or(footer.len() as u64)),
            compression: Some(self.raw_compression.unwrap_or(self.compression as i32)),
            compression_block_size: Some(self.block_size_override.unwrap_or(self.block_size)),
            version: self.version.clone(),
            metadata_length: Some(metadata.len() as u64),
            writer_version: Some(WriterVersion::CURRENT),
            stripe_statistics_length: self.stripe_statistics_length,
            magic: self.postscript_magic.then(|| "ORC".to_string()),
        }
        .encode_to_vec();
        assert!(postscript.len() < 256);

        file.extend_from_slice(&metadata);
        file.extend_from_slice(&footer);
        file.extend_from_slice(&postscript);
        file.push(postscript.len() as u8);
        file
    }
}

fn open(file: Vec<u8>) -> crate::Result<Reader> {
    Reader::open(Arc::new(InMemorySource::new(file)), ReaderOptions::new())
}

/// Size estimate of the sample: int 4 bytes, strings averaging 5 and 2
/// characters (80 and 72 bytes each), doubles 8 bytes.
const SAMPLE_ID_SIZE: u64 = 1000 * 4;
const SAMPLE_NAME_SIZE: u64 = 1000 * 80;
const SAMPLE_TAGS_SIZE: u64 = 3000 * 72;
const SAMPLE_SCORE_SIZE: u64 = 990 * 8;

#[test]
fn test_open_sample() {
    let reader = open(TailBuilder::sample().build()).unwrap();
    assert_eq!(reader.number_of_rows(), 1000);
    assert_eq!(reader.stripes().len(), 2);
    assert_eq!(reader.stripes()[1].number_of_rows, 400);
    assert_eq!(reader.content_length(), 243);
    assert_eq!(reader.row_index_stride(), 10_000);
    assert_eq!(reader.compression(), CompressionKind::None);
    assert_eq!(reader.compression_block_size(), 1024);
    assert_eq!(reader.version_list(), &[0, 12]);
    assert_eq!(reader.file_version(), FileVersion::V0_12);
    assert_eq!(reader.writer_version(), WriterVersion::Orc14);
    assert_eq!(
        reader.schema().to_string(),
        "struct<id:int,name:string,tags:array<string>,score:double>"
    );
    assert_eq!(reader.metadata_keys(), vec!["owner"]);
    assert_eq!(&reader.metadata_value("owner").unwrap()[..], b"etl");
    assert!(reader.metadata_value("missing").is_none());
    assert_eq!(reader.file_statistics().len(), 6);
    assert!(matches!(
        reader.file_statistics()[1].kind,
        ColumnStatisticsKind::Integer { maximum: Some(1000), .. }
    ));
    let tail = reader.file_tail();
    assert_eq!(reader.metadata_size(), tail.postscript.metadata_length);
    assert_eq!(
        reader.metadata_size(),
        tail.metadata_bytes().unwrap().len() as u64
    );
    assert_eq!(
        tail.serialized_tail.len() as u64,
        1 + tail.postscript_length as u64 + tail.postscript.footer_length + reader.metadata_size()
    );
}

#[test]
fn test_raw_data_size() {
    let reader = open(TailBuilder::sample().build()).unwrap();
    assert_eq!(reader.raw_data_size_of_fields(&["id"]), SAMPLE_ID_SIZE);
    assert_eq!(reader.raw_data_size_of_fields(&["name"]), SAMPLE_NAME_SIZE);
    assert_eq!(reader.raw_data_size_of_fields(&["tags"]), SAMPLE_TAGS_SIZE);
    assert_eq!(reader.raw_data_size_of_fields(&["score"]), SAMPLE_SCORE_SIZE);
    assert_eq!(
        reader.raw_data_size(),
        SAMPLE_ID_SIZE + SAMPLE_NAME_SIZE + SAMPLE_TAGS_SIZE + SAMPLE_SCORE_SIZE
    );
    assert_eq!(reader.raw_data_size_of_fields(&["missing_field"]), 0);
    assert_eq!(
        reader.raw_data_size_of_fields(&["id", "missing_field"]),
        SAMPLE_ID_SIZE
    );

    let names = ["id", "name", "tags", "score"];
    let sizes: Vec<u64> = (0..=names.len())
        .map(|n| reader.raw_data_size_of_fields(&names[..n]))
        .collect();
    assert!(sizes.windows(2).all(|w| w[0] <= w[1]), "{sizes:?}");
    assert_eq!(reader.raw_data_size_of_columns(&[1, 99]), SAMPLE_ID_SIZE);
}

#[test]
fn test_stripe_statistics_share_pool() {
    let pool = Arc::new(CodecPool::default());
    let file = TailBuilder::sample().compression(CompressionKind::Zlib).build();
    let reader = Reader::open(
        Arc::new(InMemorySource::new(file)),
        ReaderOptions::new().with_codec_pool(pool.clone()),
    )
    .unwrap();
    assert_eq!(pool.idle(CompressionKind::Zlib), 1);

    let stats = reader.stripe_statistics().unwrap();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].columns[1].number_of_values, 600);
    assert_eq!(stats[1].columns[4].number_of_values, 1200);
    // The footer's decompressor was reused for the metadata block.
    assert_eq!(pool.created(), 1);
    assert!(Arc::ptr_eq(&stats, &reader.stripe_statistics().unwrap()));
}

#[test]
fn test_concurrent_readers() {
    let reader = Arc::new(
        open(TailBuilder::sample().compression(CompressionKind::Snappy).build()).unwrap(),
    );
    std::thread::scope(|s| {
        for _ in 0..4 {
            let reader = reader.clone();
            s.spawn(move || {
                assert_eq!(reader.stripe_statistics().unwrap().len(), 2);
                assert!(reader.raw_data_size() > 0);
            });
        }
    });
}

#[test]
fn test_zero_byte_file() {
    let reader = open(Vec::new()).unwrap();
    assert_eq!(reader.number_of_rows(), 0);
    assert_eq!(reader.types().len(), 1);
    assert_eq!(reader.schema().to_string(), "struct<>");
    assert_eq!(reader.compression(), CompressionKind::None);
    assert!(reader.stripes().is_empty());
    assert!(reader.stripe_statistics().unwrap().is_empty());
    assert_eq!(reader.raw_data_size(), 0);
    assert!(reader.serialized_tail().is_none());
}

#[test]
fn test_short_files_truncated() {
    for len in 1..=3 {
        let err = open(b"ORC"[..len].to_vec()).unwrap_err();
        assert!(matches!(err, OrcTailError::TruncatedFile { .. }), "{err}");
    }
}

#[test]
fn test_magic() {
    let mut builder = TailBuilder::sample();
    builder.postscript_magic = false;
    // 0.11 files only carry the magic in the header.
    open(builder.build()).unwrap();

    builder.header_magic = false;
    let err = open(builder.build()).unwrap_err();
    assert!(matches!(err, OrcTailError::MalformedFormat { .. }), "{err}");
}

#[test]
fn test_legacy_magic_read_from_header() {
    let mut builder = TailBuilder::sample().padding(40_000);
    builder.postscript_magic = false;
    let file = builder.build();
    let len = file.len() as u64;
    let source = Arc::new(InMemorySource::new(file));
    Reader::open(source.clone(), ReaderOptions::new()).unwrap();
    let ranges = source.access_ranges();
    assert_eq!(ranges[0], len - 16 * 1024..len);
    assert_eq!(ranges[1], 0..3);
}

#[test]
fn test_declared_lengths_out_of_range() {
    let mut builder = TailBuilder::sample().compression(CompressionKind::Zlib);
    builder.block_size_override = Some(u64::MAX);
    let err = open(builder.build()).unwrap_err();
    assert!(matches!(err, OrcTailError::MalformedFormat { .. }), "{err}");

    let mut builder = TailBuilder::sample();
    builder.footer_length_override = Some(u64::MAX - 5);
    let err = open(builder.build()).unwrap_err();
    assert!(matches!(err, OrcTailError::MalformedFormat { .. }), "{err}");
}

#[test]
fn test_legacy_serialized_tail_round_trip() {
    let mut builder = TailBuilder::sample().compression(CompressionKind::Snappy);
    builder.postscript_magic = false;
    let reader = open(builder.build()).unwrap();
    let tail = reader.file_tail();
    let parsed = FileTail::parse(
        reader.serialized_tail().unwrap(),
        tail.file_length,
        tail.modification_time,
        &CodecPool::default(),
    )
    .unwrap();
    assert_eq!(&parsed, tail.as_ref());
}

#[test]
fn test_unknown_compression() {
    let mut builder = TailBuilder::sample();
    builder.raw_compression = Some(9);
    let err = open(builder.build()).unwrap_err();
    assert!(matches!(err, OrcTailError::UnknownCompression(9)), "{err}");
}

#[test]
fn test_lzo_unavailable() {
    let mut builder = TailBuilder::sample();
    builder.raw_compression = Some(CompressionKind::Lzo as i32);
    let err = open(builder.build()).unwrap_err();
    assert!(
        matches!(err, OrcTailError::CodecUnavailable(CompressionKind::Lzo)),
        "{err}"
    );
}

#[test]
fn test_expansion_matches_single_read() {
    let file = TailBuilder::sample().build();
    let source = Arc::new(InMemorySource::new(file));
    // Raised to the smallest read that still holds any postscript.
    let small = Reader::open(
        source.clone(),
        ReaderOptions::new().with_initial_read_size(16),
    )
    .unwrap();
    assert!(small.file_tail().serialized_tail.len() as u64 > MIN_INITIAL_READ_SIZE);
    assert_eq!(source.access_ranges().len(), 2);

    let whole = Reader::open(source, ReaderOptions::new()).unwrap();
    assert_eq!(small.file_tail(), whole.file_tail());
    assert_eq!(small.raw_data_size(), whole.raw_data_size());
}

#[test]
fn test_serialized_tail_round_trip() {
    let pool = CodecPool::default();
    let reader = open(TailBuilder::sample().compression(CompressionKind::Zstd).build()).unwrap();
    let tail = reader.file_tail();
    let parsed = FileTail::parse(
        reader.serialized_tail().unwrap(),
        tail.file_length,
        tail.modification_time,
        &pool,
    )
    .unwrap();
    assert_eq!(&parsed, tail.as_ref());
}

#[test]
fn test_future_version() {
    // Readable with a warning when nothing unknown is used.
    let reader = open(TailBuilder::sample().version(vec![2, 1]).build()).unwrap();
    assert_eq!(reader.file_version(), FileVersion::Future);

    let err = open(
        TailBuilder::sample()
            .version(vec![2, 1])
            .encryption(true)
            .build(),
    )
    .unwrap_err();
    match err {
        OrcTailError::UnsupportedVersion { version, features } => {
            assert_eq!(version, "2.1");
            assert_eq!(features, vec!["column encryption"]);
        }
        other => panic!("unexpected error {other:?}"),
    }

    let mut builder = TailBuilder::sample().version(vec![2, 1]);
    builder.stripe_statistics_length = Some(64);
    let err = open(builder.build()).unwrap_err();
    assert!(matches!(err, OrcTailError::UnsupportedVersion { .. }), "{err}");

    // Known versions are not held to the feature check.
    open(TailBuilder::sample().encryption(true).build()).unwrap();
}

#[test]
fn test_malformed_version_list() {
    let err = open(TailBuilder::sample().version(vec![0]).build()).unwrap_err();
    assert!(matches!(err, OrcTailError::MalformedFormat { .. }), "{err}");

    let reader = open(TailBuilder::sample().version(vec![]).build()).unwrap();
    assert_eq!(reader.file_version(), FileVersion::V0_11);
}

#[test]
fn test_provided_file_tail_skips_storage() {
    let tail = open(TailBuilder::sample().build())
        .unwrap()
        .file_tail()
        .clone();
    let source = Arc::new(InMemorySource::new(b"not an orc file".to_vec()));
    let reader = Reader::open(
        source.clone(),
        ReaderOptions::new().with_file_tail(tail.clone()),
    )
    .unwrap();
    assert!(source.access_ranges().is_empty());
    assert_eq!(source.status_count(), 0);
    assert_eq!(reader.number_of_rows(), 1000);
    assert_eq!(reader.stripe_statistics().unwrap().len(), 2);
    assert_eq!(reader.serialized_tail().unwrap(), tail.serialized_tail);
}

#[test]
fn test_provided_file_tail_is_checked() {
    let mut tail = FileTail::clone(
        open(TailBuilder::sample().encryption(true).build())
            .unwrap()
            .file_tail(),
    );
    tail.postscript.version = vec![3, 0];
    let err = Reader::open(
        Arc::new(InMemorySource::new(Vec::<u8>::new())),
        ReaderOptions::new().with_file_tail(Arc::new(tail)),
    )
    .unwrap_err();
    assert!(matches!(err, OrcTailError::UnsupportedVersion { .. }), "{err}");
}

#[test]
fn test_provided_file_metadata() {
    let first = open(TailBuilder::sample().build()).unwrap();
    let metadata = FileMetadata::from_tail(first.file_tail());
    let source = Arc::new(InMemorySource::new(Vec::<u8>::new()));

    let reader = Reader::open(
        source.clone(),
        ReaderOptions::new().with_file_metadata(Arc::new(metadata.clone())),
    )
    .unwrap();
    assert!(source.access_ranges().is_empty());
    assert_eq!(reader.number_of_rows(), 1000);
    assert_eq!(reader.raw_data_size(), first.raw_data_size());
    assert!(reader.serialized_tail().is_none());
    assert!(reader.file_metadata().is_some());
    assert!(matches!(
        reader.stripe_statistics(),
        Err(OrcTailError::MetadataUnavailable)
    ));

    let stats = first.stripe_statistics().unwrap().to_vec();
    let reader = Reader::open(
        source,
        ReaderOptions::new()
            .with_file_metadata(Arc::new(metadata.with_stripe_statistics(stats)))
            .with_file_tail(first.file_tail().clone()),
    )
    .unwrap();
    assert_eq!(reader.stripe_statistics().unwrap().len(), 2);
    assert!(reader.serialized_tail().is_none());
}

#[test]
fn test_storage_override_and_max_length() {
    let file = TailBuilder::sample().build();
    let len = file.len() as u64;
    let storage = Arc::new(InMemorySource::new(file));
    let source = Arc::new(InMemorySource::new(Vec::<u8>::new()));
    let reader = Reader::open(
        source.clone(),
        ReaderOptions::new()
            .with_storage(storage.clone())
            .with_max_length(len),
    )
    .unwrap();
    assert_eq!(reader.number_of_rows(), 1000);
    assert_eq!(reader.file_length(), len);
    assert!(source.access_ranges().is_empty());
    assert_eq!(storage.status_count(), 0);
}

#[test]
fn test_local_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&TailBuilder::sample().compression(CompressionKind::Zlib).build())
        .unwrap();
    file.flush().unwrap();

    let source = Arc::new(LocalFile::open(file.path()).unwrap());
    let status = source.status().unwrap();
    let reader = Reader::open(source, ReaderOptions::new().with_use_utc_timestamps(true)).unwrap();
    assert_eq!(reader.number_of_rows(), 1000);
    assert_eq!(reader.file_length(), status.len);
    assert!(reader.modification_time().is_some());
    assert!(reader.use_utc_timestamps());
}

#[test]
fn test_corrupt_footer() {
    let mut builder = TailBuilder::sample().compression(CompressionKind::Zstd);
    // Repetitive enough that the footer is stored compressed.
    builder.footer.software_version = Some("orc-tail ".repeat(50));
    let mut file = builder.build();
    let reader = open(file.clone()).unwrap();
    let tail = reader.file_tail();
    let footer_end = file.len() - 1 - tail.postscript_length as usize;
    let footer_start = footer_end - tail.postscript.footer_length as usize;
    assert_eq!(file[footer_start] & 1, 0);
    // Overwrite the zstd frame magic after the chunk header.
    for byte in &mut file[footer_start + 3..footer_start + 7] {
        *byte ^= 0x5a;
    }
    let err = open(file).unwrap_err();
    assert!(matches!(err, OrcTailError::MalformedFormat { .. }), "{err}");
}
