//! Bounds-checked byte cursor with explicit endianness.
//!
//! All record decoding goes through [`ByteCursor`]; a short read surfaces
//! as [`ClassError::Truncated`] instead of a panic or an out-of-bounds
//! access, which is what keeps truncated archive files survivable.

use crate::types::ByteOrder;
use crate::{ClassError, Result};

/// Bytes per storage word. All addresses stored in a CLASSIC file (block
/// numbers, word numbers, section addresses) count 4-byte words, 1-based.
pub const WORD: usize = 4;

/// Convert a 1-based word address to a byte offset.
///
/// Returns `None` for addresses below 1, which only occur in corrupt input.
pub fn word_to_offset(word: i64) -> Option<usize> {
    if word < 1 {
        return None;
    }
    usize::try_from(word - 1).ok()?.checked_mul(WORD)
}

/// Read-only cursor over a byte slice.
#[derive(Debug, Clone, Copy)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current absolute byte offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left between the position and the end of the slice.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Move to an absolute byte offset. Seeking past the end fails.
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.data.len() {
            return Err(ClassError::Truncated {
                offset,
                needed: 0,
                available: self.data.len(),
            });
        }
        self.pos = offset;
        Ok(())
    }

    /// Read exactly `n` bytes and advance.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(ClassError::Truncated {
            offset: self.pos,
            needed: n,
            available: self.remaining(),
        })?;
        if end > self.data.len() {
            return Err(ClassError::Truncated {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Skip exactly `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    pub fn read_i32(&mut self, order: ByteOrder) -> Result<i32> {
        let b = self.read_bytes(4)?;
        let bytes = [b[0], b[1], b[2], b[3]];
        Ok(match order {
            ByteOrder::Little => i32::from_le_bytes(bytes),
            ByteOrder::Big => i32::from_be_bytes(bytes),
        })
    }

    pub fn read_i64(&mut self, order: ByteOrder) -> Result<i64> {
        let b = self.read_bytes(8)?;
        let bytes = [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]];
        Ok(match order {
            ByteOrder::Little => i64::from_le_bytes(bytes),
            ByteOrder::Big => i64::from_be_bytes(bytes),
        })
    }

    pub fn read_f32(&mut self, order: ByteOrder) -> Result<f32> {
        let b = self.read_bytes(4)?;
        let bytes = [b[0], b[1], b[2], b[3]];
        Ok(match order {
            ByteOrder::Little => f32::from_le_bytes(bytes),
            ByteOrder::Big => f32::from_be_bytes(bytes),
        })
    }

    pub fn read_f64(&mut self, order: ByteOrder) -> Result<f64> {
        let b = self.read_bytes(8)?;
        let bytes = [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]];
        Ok(match order {
            ByteOrder::Little => f64::from_le_bytes(bytes),
            ByteOrder::Big => f64::from_be_bytes(bytes),
        })
    }

    /// Read a fixed-width character field, stripping NUL padding and
    /// surrounding whitespace.
    pub fn read_string(&mut self, len: usize) -> Result<String> {
        let raw = self.read_bytes(len)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).trim().to_string())
    }
}
