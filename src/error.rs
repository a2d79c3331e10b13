//! Crate-wide error type.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::identifier::IdentifierCode;

/// Everything that can go wrong while reducing one VCD file to a leakage
/// trace. Every variant is fatal to the current file's parse; none are
/// recovered inside this crate.
#[derive(Debug)]
pub enum Error {
    /// The file could not be opened, `stat`'d, or memory-mapped.
    Io { path: PathBuf, source: io::Error },

    /// An unrecognized token where the grammar required one, an unterminated
    /// delimiter search, or an empty identifier code. `offset` is the byte
    /// position of the cursor at the point of failure.
    MalformedTrace { offset: usize, detail: String },

    /// A `$var ... $end` declaration did not match the declaration recorded
    /// for the same identifier earlier in the batch.
    InconsistentVars { offset: usize, declaration: String },

    /// `$dumpall`, `$dumpoff`, `$dumpon`, a mid-stream `$comment`, or a
    /// real-valued (`r`/`R`) change was encountered.
    Unsupported { offset: usize, feature: &'static str },

    /// An extraction request names an identifier absent from the variable
    /// table after header parsing.
    UnknownIdentifier { id: IdentifierCode },

    /// The stream ended before every extraction request was satisfied.
    MissingExtraction { remaining: usize },

    /// `downsample == 0`.
    InvalidConfig { detail: &'static str },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to open/map {}: {source}", path.display())
            }
            Self::MalformedTrace { offset, detail } => {
                write!(f, "malformed trace at byte {offset}: {detail}")
            }
            Self::InconsistentVars { offset, declaration } => {
                write!(
                    f,
                    "variable declaration `{declaration}` at byte {offset} is inconsistent with an earlier file in this batch"
                )
            }
            Self::Unsupported { offset, feature } => {
                write!(f, "unsupported construct `{feature}` at byte {offset}")
            }
            Self::UnknownIdentifier { id } => {
                write!(f, "extraction request names unknown identifier {id:?}")
            }
            Self::MissingExtraction { remaining } => {
                write!(f, "{remaining} extraction request(s) were never satisfied")
            }
            Self::InvalidConfig { detail } => write!(f, "invalid configuration: {detail}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub(crate) fn malformed(offset: usize, detail: impl Into<String>) -> Error {
    Error::MalformedTrace {
        offset,
        detail: detail.into(),
    }
}
