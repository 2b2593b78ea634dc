//! Protobuf messages of the ORC file tail.
//!
//! Field numbers follow `orc_proto.proto`. Only the messages needed to read the
//! tail are declared; unknown fields are skipped by the decoder.
#![allow(missing_docs)]

use std::fmt::Display;

use serde::Serialize;

/// Compression applied to the footer, the metadata block and every stream.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ::prost::Enumeration,
)]
#[repr(i32)]
pub enum CompressionKind {
    None = 0,
    Zlib = 1,
    Snappy = 2,
    Lzo = 3,
    Lz4 = 4,
    Zstd = 5,
}

impl Display for CompressionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                CompressionKind::None => "NONE",
                CompressionKind::Zlib => "ZLIB",
                CompressionKind::Snappy => "SNAPPY",
                CompressionKind::Lzo => "LZO",
                CompressionKind::Lz4 => "LZ4",
                CompressionKind::Zstd => "ZSTD",
            }
        )
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PostScript {
    #[prost(uint64, optional, tag = "1")]
    pub footer_length: Option<u64>,

    #[prost(enumeration = "CompressionKind", optional, tag = "2")]
    pub compression: Option<i32>,

    #[prost(uint64, optional, tag = "3")]
    pub compression_block_size: Option<u64>,

    #[prost(uint32, repeated, packed = "true", tag = "4")]
    pub version: Vec<u32>,

    #[prost(uint64, optional, tag = "5")]
    pub metadata_length: Option<u64>,

    #[prost(uint32, optional, tag = "6")]
    pub writer_version: Option<u32>,

    #[prost(uint64, optional, tag = "7")]
    pub stripe_statistics_length: Option<u64>,

    #[prost(string, optional, tag = "8000")]
    pub magic: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StripeInformation {
    #[prost(uint64, optional, tag = "1")]
    pub offset: Option<u64>,

    #[prost(uint64, optional, tag = "2")]
    pub index_length: Option<u64>,

    #[prost(uint64, optional, tag = "3")]
    pub data_length: Option<u64>,

    #[prost(uint64, optional, tag = "4")]
    pub footer_length: Option<u64>,

    #[prost(uint64, optional, tag = "5")]
    pub number_of_rows: Option<u64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Type {
    /// Raw kind value; values outside [`crate::TypeKind`] come from newer writers.
    #[prost(int32, optional, tag = "1")]
    pub kind: Option<i32>,

    #[prost(uint32, repeated, packed = "true", tag = "2")]
    pub subtypes: Vec<u32>,

    #[prost(string, repeated, tag = "3")]
    pub field_names: Vec<String>,

    #[prost(uint32, optional, tag = "4")]
    pub maximum_length: Option<u32>,

    #[prost(uint32, optional, tag = "5")]
    pub precision: Option<u32>,

    #[prost(uint32, optional, tag = "6")]
    pub scale: Option<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UserMetadataItem {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,

    #[prost(bytes = "bytes", optional, tag = "2")]
    pub value: Option<::bytes::Bytes>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IntegerStatistics {
    #[prost(sint64, optional, tag = "1")]
    pub minimum: Option<i64>,
    #[prost(sint64, optional, tag = "2")]
    pub maximum: Option<i64>,
    #[prost(sint64, optional, tag = "3")]
    pub sum: Option<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DoubleStatistics {
    #[prost(double, optional, tag = "1")]
    pub minimum: Option<f64>,
    #[prost(double, optional, tag = "2")]
    pub maximum: Option<f64>,
    #[prost(double, optional, tag = "3")]
    pub sum: Option<f64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StringStatistics {
    #[prost(string, optional, tag = "1")]
    pub minimum: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub maximum: Option<String>,
    /// Total length of all strings in the column.
    #[prost(sint64, optional, tag = "3")]
    pub sum: Option<i64>,
    #[prost(string, optional, tag = "4")]
    pub lower_bound: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub upper_bound: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BucketStatistics {
    #[prost(uint64, repeated, packed = "true", tag = "1")]
    pub count: Vec<u64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DecimalStatistics {
    #[prost(string, optional, tag = "1")]
    pub minimum: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub maximum: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub sum: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DateStatistics {
    #[prost(sint32, optional, tag = "1")]
    pub minimum: Option<i32>,
    #[prost(sint32, optional, tag = "2")]
    pub maximum: Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BinaryStatistics {
    #[prost(sint64, optional, tag = "1")]
    pub sum: Option<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TimestampStatistics {
    #[prost(sint64, optional, tag = "1")]
    pub minimum: Option<i64>,
    #[prost(sint64, optional, tag = "2")]
    pub maximum: Option<i64>,
    #[prost(sint64, optional, tag = "3")]
    pub minimum_utc: Option<i64>,
    #[prost(sint64, optional, tag = "4")]
    pub maximum_utc: Option<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ColumnStatistics {
    #[prost(uint64, optional, tag = "1")]
    pub number_of_values: Option<u64>,
    #[prost(message, optional, tag = "2")]
    pub int_statistics: Option<IntegerStatistics>,
    #[prost(message, optional, tag = "3")]
    pub double_statistics: Option<DoubleStatistics>,
    #[prost(message, optional, tag = "4")]
    pub string_statistics: Option<StringStatistics>,
    #[prost(message, optional, tag = "5")]
    pub bucket_statistics: Option<BucketStatistics>,
    #[prost(message, optional, tag = "6")]
    pub decimal_statistics: Option<DecimalStatistics>,
    #[prost(message, optional, tag = "7")]
    pub date_statistics: Option<DateStatistics>,
    #[prost(message, optional, tag = "8")]
    pub binary_statistics: Option<BinaryStatistics>,
    #[prost(message, optional, tag = "9")]
    pub timestamp_statistics: Option<TimestampStatistics>,
    #[prost(bool, optional, tag = "10")]
    pub has_null: Option<bool>,
    #[prost(uint64, optional, tag = "11")]
    pub bytes_on_disk: Option<u64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Footer {
    #[prost(uint64, optional, tag = "1")]
    pub header_length: Option<u64>,

    #[prost(uint64, optional, tag = "2")]
    pub content_length: Option<u64>,

    #[prost(message, repeated, tag = "3")]
    pub stripes: Vec<StripeInformation>,

    #[prost(message, repeated, tag = "4")]
    pub types: Vec<Type>,

    #[prost(message, repeated, tag = "5")]
    pub metadata: Vec<UserMetadataItem>,

    #[prost(uint64, optional, tag = "6")]
    pub number_of_rows: Option<u64>,

    #[prost(message, repeated, tag = "7")]
    pub statistics: Vec<ColumnStatistics>,

    #[prost(uint32, optional, tag = "8")]
    pub row_index_stride: Option<u32>,

    #[prost(uint32, optional, tag = "9")]
    pub writer: Option<u32>,

    /// Column encryption descriptor. Kept opaque: its presence is all this reader checks.
    #[prost(bytes = "vec", optional, tag = "10")]
    pub encryption: Option<Vec<u8>>,

    #[prost(string, optional, tag = "12")]
    pub software_version: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StripeStatistics {
    #[prost(message, repeated, tag = "1")]
    pub col_stats: Vec<ColumnStatistics>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Metadata {
    #[prost(message, repeated, tag = "1")]
    pub stripe_stats: Vec<StripeStatistics>,
}
