//! Error types for CLASSIC file decoding.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not a CLASSIC file: unrecognized file code {code:?}")]
    UnrecognizedFormat { code: [u8; 4] },

    #[error("malformed directory: {0}")]
    MalformedDirectory(String),

    #[error("truncated input at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("unsupported observation record tag {0:?}")]
    UnsupportedVersion(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("scan {0} not found")]
    NotFound(usize),
}

pub type Result<T> = std::result::Result<T, ClassError>;
