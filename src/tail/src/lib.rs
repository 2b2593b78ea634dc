#![warn(missing_docs)]
//! Decoding of the ORC file tail: postscript, footer, stripe statistics and
//! the type tree, read with at most two storage requests.
//!
//! ```rust
//! use std::sync::Arc;
//! use orc_tail::{InMemorySource, Reader, ReaderOptions};
//!
//! // Zero byte files are valid and describe an empty table.
//! let source = Arc::new(InMemorySource::new(Vec::<u8>::new()));
//! let reader = Reader::open(source, ReaderOptions::new()).unwrap();
//! assert_eq!(reader.number_of_rows(), 0);
//! assert_eq!(reader.schema().to_string(), "struct<>");
//! ```

pub mod codec;
mod config;
mod error;
pub mod footer;
pub mod postscript;
pub mod proto;
mod reader;
pub mod schema;
pub mod source;
pub mod statistics;
pub mod tail;
pub mod version;

pub use codec::{CodecPool, PooledDecompressor};
pub use config::ReaderOptions;
pub use error::{OrcTailError, Result};
pub use footer::{Footer, StripeInfo, TypeKind, TypeNode};
pub use proto::CompressionKind;
pub use reader::{FileMetadata, Reader};
pub use schema::TypeTree;
pub use source::{ByteSource, InMemorySource, LocalFile, SourceStatus};
pub use statistics::{ColumnStatistics, ColumnStatisticsKind, StripeStatistics};
pub use tail::{FileTail, TailLocator};
pub use version::{FileVersion, WriterVersion};

#[cfg(test)]
mod tests;
