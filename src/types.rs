//! Shared types: [`ByteOrder`], [`FileKind`], [`FormatVersion`], and [`ObsKind`].

use std::fmt;

use crate::{ClassError, Result};

/// Container layout version, determined by the 4-byte file code.
///
/// `"1A  "` files use fixed 512-byte blocks and 32-bit directory entries;
/// `"2A  "` files declare their record length in the file header and use
/// 64-bit block and scan numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    V1,
    V2,
}

impl FileKind {
    /// Determine the container kind from the first four bytes of the file.
    pub fn from_code(code: [u8; 4]) -> Result<Self> {
        match &code[..2] {
            b"1A" => Ok(Self::V1),
            b"2A" => Ok(Self::V2),
            _ => Err(ClassError::UnrecognizedFormat { code }),
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => write!(f, "CLASSIC v1"),
            Self::V2 => write!(f, "CLASSIC v2"),
        }
    }
}

/// Format version of a single observation record.
///
/// [`Unknown`](Self::Unknown) marks a record whose ident tag was not
/// recognized; such records decode into a minimal header carrying only the
/// directory-level identity and the raw byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    V1,
    V2,
    Unknown,
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => write!(f, "v1"),
            Self::V2 => write!(f, "v2"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Byte order for multi-byte fields.
///
/// CLASSIC files written by CLASS on current hardware are little-endian
/// throughout; the cursor still takes the order explicitly per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

/// Observation kind, from the directory entry's `xkind` field.
///
/// Spectra carry their axis parameters in the spectroscopy section,
/// continuum drifts in the drift section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObsKind {
    Spectrum,
    Drift,
    Other(i32),
}

impl ObsKind {
    pub fn from_xkind(xkind: i32) -> Self {
        match xkind {
            0 => Self::Spectrum,
            1 => Self::Drift,
            k => Self::Other(k),
        }
    }
}

impl fmt::Display for ObsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spectrum => write!(f, "spectrum"),
            Self::Drift => write!(f, "drift"),
            Self::Other(k) => write!(f, "kind {k}"),
        }
    }
}

/// Header section codes, as stored in an observation record's section table.
pub mod section {
    pub const GENERAL: i32 = -2;
    pub const POSITION: i32 = -3;
    pub const SPECTRO: i32 = -4;
    pub const BASELINE: i32 = -5;
    pub const HISTORY: i32 = -6;
    pub const PLOT: i32 = -7;
    pub const SWITCH: i32 = -8;
    pub const GAUSS: i32 = -9;
    pub const DRIFT: i32 = -10;
    pub const CALIBRATION: i32 = -14;
}
