//! The [`ClassReader`] façade: open a file, build the directory once,
//! query headers and spectra by 1-based scan index.
//!
//! The whole file is read into an immutable buffer at open time and every
//! query addresses it by offset, so a `ClassReader` is `Send + Sync` and
//! safe to share across threads without locking. Per-scan decode failures
//! are returned to the caller and never poison later queries. Headers and
//! spectra are re-decoded on every query; nothing beyond the directory is
//! cached.

use std::fs;
use std::path::Path;

use crate::directory::{read_file_descriptor, Directory, DirectoryEntry, SkippedEntry};
use crate::header::{decode_header, ScanHeader};
use crate::spectrum::{decode_spectrum, Spectrum};
use crate::types::FileKind;
use crate::{ClassError, Result};

/// Static identifier of this reader implementation.
pub fn version_label() -> &'static str {
    concat!("classic-rs ", env!("CARGO_PKG_VERSION"))
}

/// Reader over one CLASSIC container file.
#[derive(Debug, Clone)]
pub struct ClassReader {
    data: Vec<u8>,
    kind: FileKind,
    directory: Directory,
}

impl ClassReader {
    /// Open a file and build its scan directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| ClassError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(data)
    }

    /// Build a reader over an in-memory file image.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let desc = read_file_descriptor(&data)?;
        let directory = Directory::build(&data, &desc)?;
        Ok(Self {
            data,
            kind: desc.kind,
            directory,
        })
    }

    /// Container layout version of the open file.
    pub fn file_kind(&self) -> FileKind {
        self.kind
    }

    /// Number of valid scans in the directory.
    pub fn scan_count(&self) -> usize {
        self.directory.len()
    }

    /// Valid directory entries in slot order.
    pub fn entries(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.directory.entries()
    }

    /// Directory slots that were excluded, with reasons.
    pub fn skipped(&self) -> &[SkippedEntry] {
        self.directory.skipped()
    }

    fn entry(&self, scan: usize) -> Result<&DirectoryEntry> {
        self.directory.get(scan).ok_or(ClassError::NotFound(scan))
    }

    /// Decode the header of the scan at a 1-based directory index.
    pub fn header(&self, scan: usize) -> Result<ScanHeader> {
        let entry = self.entry(scan)?;
        decode_header(&self.data, entry, self.kind)
    }

    /// Decode the frequency axis and data array of one scan.
    pub fn spectrum(&self, scan: usize) -> Result<Spectrum> {
        let entry = self.entry(scan)?;
        decode_spectrum(&self.data, entry, self.kind)
    }

    /// The derived frequency axis of one scan.
    pub fn frequency(&self, scan: usize) -> Result<Vec<f64>> {
        Ok(self.spectrum(scan)?.frequency)
    }

    /// The stored data array of one scan.
    pub fn data(&self, scan: usize) -> Result<Vec<f64>> {
        Ok(self.spectrum(scan)?.data)
    }
}
