//! Reconstruct the frequency axis and read the data array of one scan.
//!
//! The frequency axis is never stored in the file. It is derived from the
//! header's rest frequency, reference channel and resolution:
//!
//! ```text
//! freq[k] = (k + 1 - rchan) * fres + f0        k = 0..nchan
//! ```
//!
//! with the stored fallback that a zero resolution degrades the axis to
//! plain channel numbers. The data array is stored: `nchan` consecutive
//! f32 samples at the record's declared data word, widened to f64.
//! Non-finite samples pass through untouched.

use crate::cursor::{word_to_offset, ByteCursor};
use crate::directory::{DirectoryEntry, FILE_ORDER};
use crate::header::{read_prologue, record_slice, ScanHeader};
use crate::types::FileKind;
use crate::{ClassError, Result};

/// Channel ceiling: 1 MiB of f32 samples per scan.
pub const MAX_CHANNELS: usize = 262_144;

/// One decoded spectrum: derived frequency axis and stored data array,
/// always of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    /// Frequency per channel, MHz.
    pub frequency: Vec<f64>,
    /// Intensity per channel.
    pub data: Vec<f64>,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Compute the derived frequency axis.
pub fn frequency_axis(nchan: usize, f0: f64, rchan: f64, fres: f64) -> Vec<f64> {
    if fres == 0.0 {
        return (1..=nchan).map(|k| k as f64).collect();
    }
    (1..=nchan)
        .map(|k| (k as f64 - rchan) * fres + f0)
        .collect()
}

/// Validate the axis parameters of a header and return them as
/// `(nchan, rchan, f0, fres)`.
fn axis_params(header: &ScanHeader) -> Result<(usize, f64, f64, f64)> {
    let nchan = header.nchan;
    if nchan < 1 {
        return Err(ClassError::InvalidHeader(format!(
            "channel count {nchan} is not positive"
        )));
    }
    let nchan = nchan as usize;
    if nchan > MAX_CHANNELS {
        return Err(ClassError::InvalidHeader(format!(
            "channel count {nchan} exceeds the {MAX_CHANNELS} ceiling"
        )));
    }
    // With a zero resolution the axis is channel numbers and the reference
    // channel is unused, so it is not required to be in range.
    if header.f_res != 0.0 && !(1.0..=nchan as f64).contains(&header.rchan) {
        return Err(ClassError::InvalidHeader(format!(
            "reference channel {} outside [1, {nchan}]",
            header.rchan
        )));
    }
    Ok((nchan, header.rchan, header.f_rest, header.f_res))
}

/// Decode the spectrum of the scan addressed by a directory entry.
pub fn decode_spectrum(data: &[u8], entry: &DirectoryEntry, kind: FileKind) -> Result<Spectrum> {
    let rec = record_slice(data, entry)?;
    let prologue = match read_prologue(rec, kind)? {
        Some(p) => p,
        None => {
            let tag = String::from_utf8_lossy(&rec[..4.min(rec.len())]).into_owned();
            return Err(ClassError::UnsupportedVersion(tag));
        }
    };
    let sections = crate::header::decode_sections(rec, &prologue)?;
    let header = crate::header::assemble(entry, prologue.version, sections);

    let (nchan, rchan, f0, fres) = axis_params(&header)?;

    let offset = word_to_offset(prologue.data_word).ok_or_else(|| {
        ClassError::InvalidHeader(format!("data array at bad word {}", prologue.data_word))
    })?;
    if prologue.data_len < nchan as i64 {
        return Err(ClassError::Truncated {
            offset: entry.offset + offset,
            needed: nchan * 4,
            available: prologue.data_len.max(0) as usize * 4,
        });
    }

    let mut cur = ByteCursor::new(rec);
    cur.seek(offset)?;
    let mut samples = Vec::with_capacity(nchan);
    for _ in 0..nchan {
        samples.push(cur.read_f32(FILE_ORDER)? as f64);
    }

    Ok(Spectrum {
        frequency: frequency_axis(nchan, f0, rchan, fres),
        data: samples,
    })
}
