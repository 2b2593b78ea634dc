//! File format and writer versions, and the forward compatibility check.

use std::fmt::Display;

use itertools::Itertools;
use log::warn;
use serde::Serialize;

use crate::error::{OrcTailError, Result};

/// Format version a file was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileVersion {
    /// 0.11, also assumed when the postscript carries no version.
    V0_11,
    /// 0.12
    V0_12,
    /// Development builds ahead of 2.0.
    UnstablePre2_0,
    /// Not in the table of known versions.
    Future,
}

const KNOWN_VERSIONS: [(FileVersion, u32, u32); 3] = [
    (FileVersion::V0_11, 0, 11),
    (FileVersion::V0_12, 0, 12),
    (FileVersion::UnstablePre2_0, 1, 9999),
];

impl FileVersion {
    /// Version written into synthetic tails.
    pub const CURRENT: FileVersion = FileVersion::V0_12;

    /// Resolve a postscript version list.
    ///
    /// Lists with a single element are malformed; extra trailing elements are ignored.
    pub fn from_version_list(version: &[u32]) -> Result<Self> {
        match version {
            [] => Ok(FileVersion::V0_11),
            [_] => Err(OrcTailError::malformed(format!(
                "version list {version:?} has no minor version"
            ))),
            [major, minor, ..] => Ok(KNOWN_VERSIONS
                .iter()
                .find(|(_, ma, mi)| ma == major && mi == minor)
                .map(|(v, _, _)| *v)
                .unwrap_or(FileVersion::Future)),
        }
    }

    /// `(major, minor)` of a known version.
    pub fn major_minor(&self) -> Option<(u32, u32)> {
        KNOWN_VERSIONS
            .iter()
            .find(|(v, _, _)| v == self)
            .map(|(_, major, minor)| (*major, *minor))
    }
}

impl Display for FileVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.major_minor() {
            Some((major, minor)) => write!(f, "{major}.{minor}"),
            None => write!(f, "future"),
        }
    }
}

/// Version of the software that wrote the file, identifying known writer bugs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[allow(missing_docs)]
pub enum WriterVersion {
    Original,
    Hive8732,
    Hive4243,
    Hive12055,
    Hive13083,
    Orc101,
    Orc135,
    Orc517,
    Orc203,
    Orc14,
    Future,
}

impl WriterVersion {
    /// Writer version stamped on synthetic tails.
    pub const CURRENT: u32 = 9;

    /// Map the raw postscript id.
    pub fn from_id(id: u32) -> Self {
        match id {
            0 => WriterVersion::Original,
            1 => WriterVersion::Hive8732,
            2 => WriterVersion::Hive4243,
            3 => WriterVersion::Hive12055,
            4 => WriterVersion::Hive13083,
            5 => WriterVersion::Orc101,
            6 => WriterVersion::Orc135,
            7 => WriterVersion::Orc517,
            8 => WriterVersion::Orc203,
            9 => WriterVersion::Orc14,
            _ => WriterVersion::Future,
        }
    }
}

/// Dotted rendering of a raw version list, e.g. `0.12`.
pub fn version_string(version: &[u32]) -> String {
    version.iter().join(".")
}

/// Reject files from a future format version that use features this reader
/// does not understand. Future versions without such features are read with a
/// warning, since the format stays readable for encodings it does not add.
pub fn check_compatibility(version: &[u32], unsupported_features: &[String]) -> Result<FileVersion> {
    let file_version = FileVersion::from_version_list(version)?;
    if file_version != FileVersion::Future {
        return Ok(file_version);
    }
    if !unsupported_features.is_empty() {
        return Err(OrcTailError::UnsupportedVersion {
            version: version_string(version),
            features: unsupported_features.to_vec(),
        });
    }
    warn!(
        "ORC file version {} is newer than this reader, some column encodings may not be readable",
        version_string(version)
    );
    Ok(file_version)
}
