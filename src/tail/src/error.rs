//! Error type shared by every tail decoding step.

use crate::proto::CompressionKind;

/// Result type alias for tail operations.
pub type Result<T, E = OrcTailError> = std::result::Result<T, E>;

/// Errors raised while opening an ORC file or querying its metadata.
#[derive(Debug, thiserror::Error)]
pub enum OrcTailError {
    /// The bytes are not a well-formed ORC tail.
    #[error("Malformed ORC file: {message}")]
    MalformedFormat {
        /// What was wrong.
        message: String,
    },

    /// The file comes from a newer format version and uses features this reader lacks.
    #[error("Unsupported ORC file version {version}, unsupported features: {}", features.join(", "))]
    UnsupportedVersion {
        /// Dotted version string from the postscript.
        version: String,
        /// Human readable names of the features in use.
        features: Vec<String>,
    },

    /// The postscript names a compression kind outside the known set.
    #[error("Unknown compression kind {0}")]
    UnknownCompression(i32),

    /// The file is too short to hold the tail it declares.
    #[error("Truncated ORC file: {message}")]
    TruncatedFile {
        /// What was missing.
        message: String,
    },

    /// A field name does not exist in the root struct.
    #[error("Cannot find field {name} in {}", available.join(", "))]
    FieldNotFound {
        /// Requested name.
        name: String,
        /// Field names of the root struct.
        available: Vec<String>,
    },

    /// No decompressor exists for this compression kind.
    #[error("No decompressor available for {0}")]
    CodecUnavailable(CompressionKind),

    /// Stripe statistics were requested but the metadata block was never loaded.
    #[error("Stripe statistics are unavailable: the reader was built without a serialized tail")]
    MetadataUnavailable,

    /// Storage failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl OrcTailError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        OrcTailError::MalformedFormat {
            message: message.into(),
        }
    }

    pub(crate) fn truncated(message: impl Into<String>) -> Self {
        OrcTailError::TruncatedFile {
            message: message.into(),
        }
    }
}

impl From<prost::DecodeError> for OrcTailError {
    fn from(err: prost::DecodeError) -> Self {
        OrcTailError::malformed(err.to_string())
    }
}
