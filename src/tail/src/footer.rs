//! Footer: type tree, stripe directory, row counts, user metadata and file statistics.

use bytes::Bytes;
use log::debug;
use prost::Message;
use serde::Serialize;

use crate::codec::{CodecPool, decompress_stream};
use crate::error::{OrcTailError, Result};
use crate::postscript::Postscript;
use crate::proto;
use crate::schema::TypeTree;
use crate::statistics::ColumnStatistics;
use crate::version::check_compatibility;

/// Kind of a node in the type tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[allow(missing_docs)]
pub enum TypeKind {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    Binary,
    Timestamp,
    List,
    Map,
    Struct,
    Union,
    Decimal,
    Date,
    Varchar,
    Char,
    TimestampInstant,
}

impl TypeKind {
    /// Map the raw protobuf value.
    pub fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            0 => TypeKind::Boolean,
            1 => TypeKind::Byte,
            2 => TypeKind::Short,
            3 => TypeKind::Int,
            4 => TypeKind::Long,
            5 => TypeKind::Float,
            6 => TypeKind::Double,
            7 => TypeKind::String,
            8 => TypeKind::Binary,
            9 => TypeKind::Timestamp,
            10 => TypeKind::List,
            11 => TypeKind::Map,
            12 => TypeKind::Struct,
            13 => TypeKind::Union,
            14 => TypeKind::Decimal,
            15 => TypeKind::Date,
            16 => TypeKind::Varchar,
            17 => TypeKind::Char,
            18 => TypeKind::TimestampInstant,
            _ => return None,
        })
    }

    /// Whether nodes of this kind have children.
    pub fn is_compound(&self) -> bool {
        matches!(
            self,
            TypeKind::List | TypeKind::Map | TypeKind::Struct | TypeKind::Union
        )
    }
}

/// One node of the flattened type tree. Its column id is its index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeNode {
    /// Kind of the node.
    pub kind: TypeKind,
    /// Column ids of the children, in pre-order.
    pub children: Vec<u32>,
    /// Field names, one per child, for structs.
    pub field_names: Vec<String>,
    /// Maximum length for CHAR and VARCHAR.
    pub maximum_length: Option<u32>,
    /// Precision for DECIMAL.
    pub precision: Option<u32>,
    /// Scale for DECIMAL.
    pub scale: Option<u32>,
}

impl TypeNode {
    /// A struct with no fields.
    pub fn empty_struct() -> Self {
        Self::new(TypeKind::Struct)
    }

    /// A childless node of `kind`.
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            field_names: Vec::new(),
            maximum_length: None,
            precision: None,
            scale: None,
        }
    }
}

impl TryFrom<proto::Type> for TypeNode {
    type Error = OrcTailError;

    fn try_from(ty: proto::Type) -> Result<Self> {
        let raw = ty.kind.unwrap_or(0);
        let kind = TypeKind::from_i32(raw)
            .ok_or_else(|| OrcTailError::malformed(format!("unknown type kind {raw}")))?;
        Ok(Self {
            kind,
            children: ty.subtypes,
            field_names: ty.field_names,
            maximum_length: ty.maximum_length,
            precision: ty.precision,
            scale: ty.scale,
        })
    }
}

/// Location and size of one stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StripeInfo {
    /// Byte offset of the stripe in the file.
    pub offset: u64,
    /// Length of the index streams.
    pub index_length: u64,
    /// Length of the data streams.
    pub data_length: u64,
    /// Length of the stripe footer.
    pub footer_length: u64,
    /// Rows in the stripe.
    pub number_of_rows: u64,
}

impl StripeInfo {
    /// Index, data and footer together.
    pub fn total_length(&self) -> u64 {
        self.data_length + self.index_length + self.footer_length
    }
}

impl From<proto::StripeInformation> for StripeInfo {
    fn from(stripe: proto::StripeInformation) -> Self {
        Self {
            offset: stripe.offset.unwrap_or(0),
            index_length: stripe.index_length.unwrap_or(0),
            data_length: stripe.data_length.unwrap_or(0),
            footer_length: stripe.footer_length.unwrap_or(0),
            number_of_rows: stripe.number_of_rows.unwrap_or(0),
        }
    }
}

/// A user supplied key/value pair stored in the footer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserMetadataItem {
    /// Key.
    pub name: String,
    /// Opaque value.
    #[serde(skip)]
    pub value: Bytes,
}

/// Decoded footer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Footer {
    /// Length of the file header (the leading magic).
    pub header_length: u64,
    /// Bytes of stripe content.
    pub content_length: u64,
    /// Stripe directory, in file order.
    pub stripes: Vec<StripeInfo>,
    /// Flattened type tree, indexed by column id.
    pub types: Vec<TypeNode>,
    /// User metadata, in file order.
    pub user_metadata: Vec<UserMetadataItem>,
    /// Total rows.
    pub number_of_rows: u64,
    /// File level statistics, aligned with `types`.
    pub statistics: Vec<ColumnStatistics>,
    /// Rows between row index entries, 0 when there is no index.
    pub row_index_stride: u32,
    /// Raw id of the writer implementation.
    pub writer: Option<u32>,
    /// Software that wrote the file.
    pub software_version: Option<String>,
    /// Whether the footer declares column encryption.
    pub has_encryption: bool,
}

impl Footer {
    /// Footer of a synthetic empty file: one struct with no fields, no rows.
    pub(crate) fn empty() -> Self {
        Self {
            header_length: 0,
            content_length: 0,
            stripes: Vec::new(),
            types: vec![TypeNode::empty_struct()],
            user_metadata: Vec::new(),
            number_of_rows: 0,
            statistics: Vec::new(),
            row_index_stride: 0,
            writer: None,
            software_version: None,
            has_encryption: false,
        }
    }

    /// Features this reader does not implement, named for error messages.
    pub fn unsupported_features(&self) -> Vec<String> {
        if self.has_encryption {
            vec!["column encryption".to_string()]
        } else {
            Vec::new()
        }
    }

    /// Check the decoded footer is internally consistent.
    pub fn validate(&self) -> Result<()> {
        TypeTree::new(&self.types).validate()?;
        if !self.statistics.is_empty() && self.statistics.len() != self.types.len() {
            return Err(OrcTailError::malformed(format!(
                "footer has {} column statistics for {} columns",
                self.statistics.len(),
                self.types.len()
            )));
        }
        Ok(())
    }
}

fn footer_features(footer: &proto::Footer) -> Vec<String> {
    let mut features = Vec::new();
    if footer.encryption.is_some() {
        features.push("column encryption".to_string());
    }
    for (id, ty) in footer.types.iter().enumerate() {
        let raw = ty.kind.unwrap_or(0);
        if TypeKind::from_i32(raw).is_none() {
            features.push(format!("type kind {raw} at column {id}"));
        }
    }
    features
}

impl TryFrom<proto::Footer> for Footer {
    type Error = OrcTailError;

    fn try_from(footer: proto::Footer) -> Result<Self> {
        let types = footer
            .types
            .into_iter()
            .map(TypeNode::try_from)
            .collect::<Result<Vec<_>>>()?;
        let user_metadata = footer
            .metadata
            .into_iter()
            .map(|item| UserMetadataItem {
                name: item.name.unwrap_or_default(),
                value: item.value.unwrap_or_default(),
            })
            .collect();
        Ok(Self {
            header_length: footer.header_length.unwrap_or(0),
            content_length: footer.content_length.unwrap_or(0),
            stripes: footer.stripes.into_iter().map(StripeInfo::from).collect(),
            types,
            user_metadata,
            number_of_rows: footer.number_of_rows.unwrap_or(0),
            statistics: footer
                .statistics
                .into_iter()
                .map(ColumnStatistics::from)
                .collect(),
            row_index_stride: footer.row_index_stride.unwrap_or(0),
            writer: footer.writer,
            software_version: footer.software_version,
            has_encryption: footer.encryption.is_some(),
        })
    }
}

/// Decode and validate the footer held in `bytes`.
///
/// The footer is decompressed per the postscript, checked against the
/// version compatibility rules, and its type tree is validated before the
/// footer is returned.
pub fn decode_footer(bytes: Bytes, postscript: &Postscript, pool: &CodecPool) -> Result<Footer> {
    let raw = decompress_stream(
        "footer",
        bytes,
        postscript.compression,
        postscript.compression_block_size,
        pool,
    )?;
    debug!("Decoding {} byte footer", raw.len());
    let footer = proto::Footer::decode(raw)?;

    let mut features = postscript.unsupported_features();
    features.extend(footer_features(&footer));
    check_compatibility(&postscript.version, &features)?;

    let footer = Footer::try_from(footer)?;
    footer.validate()?;
    Ok(footer)
}
