//! Column statistics, lazily decoded stripe statistics, and raw size estimates.

use std::sync::{Arc, RwLock};

use bytes::Bytes;
use log::debug;
use prost::Message;
use serde::Serialize;

use crate::codec::{CodecPool, decompress_stream};
use crate::error::{OrcTailError, Result};
use crate::footer::{TypeKind, TypeNode};
use crate::proto::{self, CompressionKind};

/// Kind specific part of [`ColumnStatistics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[allow(missing_docs)]
pub enum ColumnStatisticsKind {
    /// Only counts are known.
    Generic,
    Integer {
        minimum: Option<i64>,
        maximum: Option<i64>,
        sum: Option<i64>,
    },
    Double {
        minimum: Option<f64>,
        maximum: Option<f64>,
        sum: Option<f64>,
    },
    String {
        minimum: Option<String>,
        maximum: Option<String>,
        /// Total length of all values.
        sum: Option<i64>,
    },
    Boolean {
        true_count: Option<u64>,
    },
    Decimal {
        minimum: Option<String>,
        maximum: Option<String>,
        sum: Option<String>,
    },
    Date {
        minimum: Option<i32>,
        maximum: Option<i32>,
    },
    Binary {
        /// Total length of all values.
        sum: Option<i64>,
    },
    Timestamp {
        minimum: Option<i64>,
        maximum: Option<i64>,
    },
}

/// Statistics of one column, for the whole file or one stripe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStatistics {
    /// Non-null values.
    pub number_of_values: u64,
    /// Whether any value is null, when recorded.
    pub has_null: Option<bool>,
    /// Bytes the column occupies on disk, when recorded.
    pub bytes_on_disk: Option<u64>,
    /// Kind specific payload.
    pub kind: ColumnStatisticsKind,
}

impl From<proto::ColumnStatistics> for ColumnStatistics {
    fn from(stats: proto::ColumnStatistics) -> Self {
        let kind = if let Some(s) = stats.int_statistics {
            ColumnStatisticsKind::Integer {
                minimum: s.minimum,
                maximum: s.maximum,
                sum: s.sum,
            }
        } else if let Some(s) = stats.double_statistics {
            ColumnStatisticsKind::Double {
                minimum: s.minimum,
                maximum: s.maximum,
                sum: s.sum,
            }
        } else if let Some(s) = stats.string_statistics {
            ColumnStatisticsKind::String {
                minimum: s.minimum.or(s.lower_bound),
                maximum: s.maximum.or(s.upper_bound),
                sum: s.sum,
            }
        } else if let Some(s) = stats.bucket_statistics {
            ColumnStatisticsKind::Boolean {
                true_count: s.count.first().copied(),
            }
        } else if let Some(s) = stats.decimal_statistics {
            ColumnStatisticsKind::Decimal {
                minimum: s.minimum,
                maximum: s.maximum,
                sum: s.sum,
            }
        } else if let Some(s) = stats.date_statistics {
            ColumnStatisticsKind::Date {
                minimum: s.minimum,
                maximum: s.maximum,
            }
        } else if let Some(s) = stats.binary_statistics {
            ColumnStatisticsKind::Binary { sum: s.sum }
        } else if let Some(s) = stats.timestamp_statistics {
            ColumnStatisticsKind::Timestamp {
                minimum: s.minimum_utc.or(s.minimum),
                maximum: s.maximum_utc.or(s.maximum),
            }
        } else {
            ColumnStatisticsKind::Generic
        };
        Self {
            number_of_values: stats.number_of_values.unwrap_or(0),
            has_null: stats.has_null,
            bytes_on_disk: stats.bytes_on_disk,
            kind,
        }
    }
}

impl ColumnStatistics {
    fn string_sum(&self) -> i64 {
        match self.kind {
            ColumnStatisticsKind::String { sum, .. } => sum.unwrap_or(0),
            _ => 0,
        }
    }

    fn binary_sum(&self) -> i64 {
        match self.kind {
            ColumnStatisticsKind::Binary { sum } => sum.unwrap_or(0),
            _ => 0,
        }
    }
}

/// Statistics of every column of one stripe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StripeStatistics {
    /// One entry per column id.
    pub columns: Vec<ColumnStatistics>,
}

/// Decode the stripe statistics block (the `metadata` section of the tail).
pub fn decode_metadata(
    bytes: Bytes,
    compression: CompressionKind,
    block_size: u64,
    pool: &CodecPool,
) -> Result<Vec<StripeStatistics>> {
    let raw = decompress_stream("metadata", bytes, compression, block_size, pool)?;
    let metadata = proto::Metadata::decode(raw)?;
    Ok(metadata
        .stripe_stats
        .into_iter()
        .map(|stripe| StripeStatistics {
            columns: stripe.col_stats.into_iter().map(ColumnStatistics::from).collect(),
        })
        .collect())
}

/// Lazily decoded view of the stripe statistics block.
///
/// The first call to [`StatisticsView::stripe_statistics`] decodes the block
/// and caches it. Concurrent first callers may each decode; the input is
/// immutable so every decode yields the same value and the last one stored wins.
#[derive(Debug)]
pub struct StatisticsView {
    metadata: Option<Bytes>,
    compression: CompressionKind,
    block_size: u64,
    pool: Arc<CodecPool>,
    cache: RwLock<Option<Arc<[StripeStatistics]>>>,
}

impl StatisticsView {
    /// View over an encoded metadata block.
    pub fn new(
        metadata: Option<Bytes>,
        compression: CompressionKind,
        block_size: u64,
        pool: Arc<CodecPool>,
    ) -> Self {
        Self {
            metadata,
            compression,
            block_size,
            pool,
            cache: RwLock::new(None),
        }
    }

    /// View over statistics that were decoded elsewhere.
    pub fn with_decoded(stats: Option<Vec<StripeStatistics>>, pool: Arc<CodecPool>) -> Self {
        Self {
            metadata: None,
            compression: CompressionKind::None,
            block_size: 0,
            pool,
            cache: RwLock::new(stats.map(Arc::from)),
        }
    }

    /// Per-stripe statistics, decoded on first use.
    pub fn stripe_statistics(&self) -> Result<Arc<[StripeStatistics]>> {
        if let Some(cached) = self.cache.read().unwrap().as_ref() {
            return Ok(cached.clone());
        }
        let Some(metadata) = self.metadata.as_ref() else {
            return Err(OrcTailError::MetadataUnavailable);
        };
        let decoded: Arc<[StripeStatistics]> = if metadata.is_empty() {
            Arc::from(Vec::new())
        } else {
            debug!("Decoding {} byte stripe statistics block", metadata.len());
            decode_metadata(metadata.clone(), self.compression, self.block_size, &self.pool)?.into()
        };
        *self.cache.write().unwrap() = Some(decoded.clone());
        Ok(decoded)
    }

    /// Whether the block has been decoded (or was supplied decoded).
    pub fn is_loaded(&self) -> bool {
        self.cache.read().unwrap().is_some()
    }
}

/*
    Per value size estimates, modelled on a 64-bit JVM with compressed
    alignment of 8 bytes, which is what downstream planners budget for:

    string object header + fields  40
    char array                     24 + 2 * len, aligned to 8
    timestamp / date               24
    decimal                        80
    long / double                   8
    int / short / byte / boolean    4
*/
const STRING_OBJECT_SIZE: u64 = 40;
const ARRAY_HEADER_SIZE: u64 = 24;
const TIMESTAMP_SIZE: u64 = 24;
const DATE_SIZE: u64 = 24;
const DECIMAL_SIZE: u64 = 80;
const WIDE_PRIMITIVE_SIZE: u64 = 8;
const NARROW_PRIMITIVE_SIZE: u64 = 4;

fn align8(size: u64) -> u64 {
    (size + 7) & !7
}

/// In-memory size of a string of `len` characters.
pub fn string_size(len: u64) -> u64 {
    STRING_OBJECT_SIZE + align8(ARRAY_HEADER_SIZE + 2 * len)
}

/// Estimated in-memory size of one column.
pub fn raw_data_size_of_column(node: &TypeNode, stats: &ColumnStatistics) -> u64 {
    let values = stats.number_of_values;
    match node.kind {
        TypeKind::Binary => stats.binary_sum().max(0) as u64,
        TypeKind::String | TypeKind::Char | TypeKind::Varchar => {
            let values = values.max(1);
            let avg_len = stats.string_sum().max(0) as u64 / values;
            values.saturating_mul(string_size(avg_len))
        }
        TypeKind::Timestamp | TypeKind::TimestampInstant => values.saturating_mul(TIMESTAMP_SIZE),
        TypeKind::Date => values.saturating_mul(DATE_SIZE),
        TypeKind::Decimal => values.saturating_mul(DECIMAL_SIZE),
        TypeKind::Double | TypeKind::Long => values.saturating_mul(WIDE_PRIMITIVE_SIZE),
        TypeKind::Float | TypeKind::Int | TypeKind::Short | TypeKind::Boolean | TypeKind::Byte => {
            values.saturating_mul(NARROW_PRIMITIVE_SIZE)
        }
        TypeKind::List | TypeKind::Map | TypeKind::Struct | TypeKind::Union => {
            debug!("No raw size estimate for compound kind {:?}", node.kind);
            0
        }
    }
}

/// Sum of [`raw_data_size_of_column`] over `column_ids`.
///
/// Ids without a type or statistics entry contribute nothing.
pub fn raw_data_size_of_columns(
    types: &[TypeNode],
    stats: &[ColumnStatistics],
    column_ids: &[u32],
) -> u64 {
    column_ids
        .iter()
        .map(|&id| match (types.get(id as usize), stats.get(id as usize)) {
            (Some(node), Some(stats)) => raw_data_size_of_column(node, stats),
            _ => {
                debug!("Column {id} has no statistics, skipping it in the raw size estimate");
                0
            }
        })
        .fold(0u64, u64::saturating_add)
}
